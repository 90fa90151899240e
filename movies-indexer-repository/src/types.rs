//! Request and response types for search index operations.

use movies_indexer_shared::SearchDocument;
use serde_json::Value;

use crate::errors::SearchIndexError;

/// A serialized document ready for a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkDocument {
    /// The external document id (`_id`).
    pub id: String,
    /// The document body (`_source`).
    pub source: Value,
}

impl BulkDocument {
    /// Serialize a typed document, keyed by its own id.
    pub fn from_document<D: SearchDocument>(document: &D) -> Result<Self, SearchIndexError> {
        let id = document.document_id();
        if id.is_empty() {
            return Err(SearchIndexError::validation("document id must not be empty"));
        }
        let source = serde_json::to_value(document)
            .map_err(|e| SearchIndexError::serialization(format!("document {}: {}", id, e)))?;
        Ok(Self { id, source })
    }
}

/// Result of a batch operation for a single item.
///
/// This struct represents the outcome of writing one document within a bulk
/// request. It indicates whether the write succeeded and includes error details
/// if it failed.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's id.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// This allows callers to handle partial failures: a bulk request can succeed as
/// a whole while individual items inside it are rejected.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    /// Ids of the documents that were not written.
    pub fn failed_ids(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.document_id.clone())
            .collect()
    }
}
