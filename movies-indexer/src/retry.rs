//! Bounded exponential backoff for calls to external systems.
//!
//! Both the extractor and the loader wrap their remote calls in a
//! [`RetryPolicy`]. Only errors classified as transient are retried; anything
//! else is returned on the first attempt.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use movies_indexer_repository::{SearchIndexError, SourceError};
use tokio::time::Instant;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{error, warn};

use crate::errors::SyncError;

/// Errors that can tell whether retrying the same call may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for SourceError {
    fn is_transient(&self) -> bool {
        SourceError::is_transient(self)
    }
}

impl Transient for SearchIndexError {
    fn is_transient(&self) -> bool {
        SearchIndexError::is_transient(self)
    }
}

/// Retry settings for one remote call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: usize,
    /// Delay before the second attempt; doubles afterwards.
    pub initial_delay: Duration,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
    /// Upper bound for all attempts and delays together.
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_elapsed: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delays(&self) -> impl Iterator<Item = Duration> {
        // ExponentialBackoff yields factor * base^n milliseconds.
        let factor = (self.initial_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1))
    }

    /// Run `action` until it succeeds, fails permanently, or the policy is
    /// exhausted.
    ///
    /// The elapsed budget only decides whether another attempt may start; an
    /// attempt already in flight is never cancelled. Exhaustion (attempts or
    /// elapsed time) is reported as [`SyncError::Connection`] naming
    /// `operation`. Non-transient errors are converted as-is.
    pub async fn run<T, E, A, Fut>(&self, operation: &str, mut action: A) -> Result<T, SyncError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display + Into<SyncError>,
    {
        let attempts = AtomicUsize::new(0);
        let max_attempts = self.max_attempts;
        let max_elapsed = self.max_elapsed;
        let started = Instant::now();

        let retried = RetryIf::spawn(
            self.delays(),
            || {
                attempts.fetch_add(1, Ordering::Relaxed);
                action()
            },
            |e: &E| {
                if !e.is_transient() || started.elapsed() >= max_elapsed {
                    return false;
                }
                let attempt = attempts.load(Ordering::Relaxed);
                if attempt < max_attempts {
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "Transient failure, backing off"
                    );
                }
                true
            },
        );

        match retried.await {
            Ok(value) => Ok(value),
            Err(e) if e.is_transient() => {
                let elapsed = started.elapsed();
                error!(
                    operation = %operation,
                    attempts = attempts.load(Ordering::Relaxed),
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Giving up after retries"
                );
                let detail = if elapsed >= max_elapsed {
                    format!("{} (no success within {:?})", e, max_elapsed)
                } else {
                    e.to_string()
                };
                Err(SyncError::connection(operation, detail))
            }
            Err(e) => Err(e.into()),
        }
    }
}
