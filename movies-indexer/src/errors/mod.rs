//! Error types for the sync pipeline.

use movies_indexer_repository::{CheckpointError, SearchIndexError, SourceError};
use thiserror::Error;

/// Errors that abort a sync pass.
///
/// Any of these sends the pass to the failed state; the watermark is left
/// untouched and the next pass retries from the same point.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A transient failure persisted through every retry.
    #[error("{operation} failed after retries: {detail}")]
    Connection { operation: String, detail: String },

    /// Non-transient error from the relational source.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Non-transient error from the search index.
    #[error("Search index error: {0}")]
    Index(#[from] SearchIndexError),

    /// The bulk request went through but some documents were rejected.
    #[error("{} document(s) failed to load into index '{index}'", failed_ids.len())]
    PartialLoad {
        index: String,
        failed_ids: Vec<String>,
    },

    /// The watermark could not be persisted.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl SyncError {
    /// Create a connection error.
    pub fn connection(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Connection {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Returns the failed document ids for a partial load.
    pub fn failed_ids(&self) -> &[String] {
        match self {
            Self::PartialLoad { failed_ids, .. } => failed_ids,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_message_names_operation() {
        let err = SyncError::connection("extract changes", "connection refused");
        assert_eq!(
            err.to_string(),
            "extract changes failed after retries: connection refused"
        );
    }

    #[test]
    fn test_partial_load_message_and_ids() {
        let err = SyncError::PartialLoad {
            index: "movies".to_string(),
            failed_ids: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "2 document(s) failed to load into index 'movies'"
        );
        assert_eq!(err.failed_ids(), ["a".to_string(), "b".to_string()]);
        assert!(SyncError::connection("x", "y").failed_ids().is_empty());
    }
}
