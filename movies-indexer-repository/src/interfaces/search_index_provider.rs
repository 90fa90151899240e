//! Search index provider trait definition.
//!
//! This module defines the abstract interface for search index operations,
//! allowing for different backend implementations (OpenSearch, Elasticsearch, etc.).

use async_trait::async_trait;
use movies_indexer_shared::Lookup;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::index_config::IndexDefinition;
use crate::types::{BatchOperationSummary, BulkDocument};

/// Abstracts the underlying search index implementation (OpenSearch, Elasticsearch, etc.).
///
/// Implementations are handed to the loader through a [`SearchIndexConnector`],
/// which makes it easy to test with mock implementations.
///
/// # Note on Document Writes
///
/// There is no separate create or update call. `bulk_upsert` writes each
/// document under its own id, replacing any previous version, so loading the
/// same document twice leaves exactly one copy in the index.
#[async_trait]
pub trait SearchIndexProvider: Send + Sync {
    /// Check whether an index with the given name exists.
    async fn index_exists(&self, index: &str) -> Result<bool, SearchIndexError>;

    /// Create an index with the definition's settings and mappings.
    ///
    /// Creating an index that already exists is not an error.
    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), SearchIndexError>;

    /// Ensure the index exists, creating it if necessary.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the index was created by this call
    /// * `Ok(false)` - If the index already existed
    /// * `Err(SearchIndexError)` - If the check or the creation fails
    async fn ensure_index_exists(
        &self,
        definition: &IndexDefinition,
    ) -> Result<bool, SearchIndexError> {
        if self.index_exists(&definition.name).await? {
            return Ok(false);
        }
        self.create_index(definition).await?;
        Ok(true)
    }

    /// Insert or replace many documents in one batched request.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcome; failed items are
    ///   reported, not dropped
    /// * `Err(SearchIndexError)` - If the request as a whole fails
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[BulkDocument],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Read a single document's source by id.
    async fn fetch_document(&self, index: &str, id: &str) -> Lookup<Value>;
}

/// Opens a fresh [`SearchIndexProvider`] session.
///
/// The loader connects once per pass and drops the provider when the pass ends,
/// so no client is held open across the idle interval.
#[async_trait]
pub trait SearchIndexConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn SearchIndexProvider>, SearchIndexError>;
}
