//! This module defines the `MovieSource` trait, the read-only interface to the
//! relational source of truth, and the options accepted by its queries.

use async_trait::async_trait;
use movies_indexer_shared::{ChangeSet, Watermark};

use crate::errors::SourceError;

/// Options for one extraction.
///
/// `page_size: None` fetches each entity kind in a single result set.
/// `Some(n)` pages through the changed rows `n` at a time in change order;
/// all pages are still collected before the extraction returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Only rows changed strictly after this instant. `None` means everything.
    pub since: Option<Watermark>,
    pub page_size: Option<u32>,
}

impl ExtractOptions {
    /// Options for a full resync.
    pub fn full() -> Self {
        Self::default()
    }

    /// Options for an incremental extraction after `watermark`.
    pub fn since(watermark: Option<Watermark>) -> Self {
        Self {
            since: watermark,
            page_size: None,
        }
    }

    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check the options before any query is issued.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.page_size == Some(0) {
            return Err(SourceError::InvalidOptions(
                "page_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for reading changed movies, genres and persons from the source.
///
/// Implementations acquire their connection per call and release it before
/// returning, on success and on error alike.
#[async_trait]
pub trait MovieSource: Send + Sync {
    /// Fetch every movie, genre and person changed after `options.since`.
    ///
    /// A movie counts as changed when the film itself, any linked genre or any
    /// linked person changed. Either the complete change set is returned or an
    /// error; never a partial set.
    async fn fetch_changes(&self, options: &ExtractOptions) -> Result<ChangeSet, SourceError>;
}
