//! Synchronization watermark.
//!
//! The watermark marks the point in time up to which every change in the
//! relational source is already reflected in the search indices.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A "fully indexed up to here" timestamp.
///
/// An absent watermark (`Option::<Watermark>::None`) means a full resync is
/// required. Watermarks are totally ordered, and [`Watermark::advance_to`]
/// never moves one backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(DateTime<Utc>);

impl Watermark {
    /// Create a watermark at the given instant.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Create a watermark at the current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The instant this watermark points at.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// Return the later of `self` and `candidate`.
    pub fn advance_to(self, candidate: Watermark) -> Watermark {
        self.max(candidate)
    }
}

impl From<DateTime<Utc>> for Watermark {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}
