//! Loader module for the movies indexer.
//!
//! Loads transformed documents into the search indices with bulk upserts.

use std::sync::Arc;

use futures::future::join_all;
use movies_indexer_repository::{
    BulkDocument, IndexDefinition, SearchIndexConnector, SearchIndexError, SearchIndexProvider,
};
use movies_indexer_repository::index_config::{GENRES_INDEX, MOVIES_INDEX, PERSONS_INDEX};
use movies_indexer_shared::{DocumentBatch, Lookup, SearchDocument};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::SyncError;
use crate::retry::RetryPolicy;

/// Number of documents written per index in one load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub movies: usize,
    pub genres: usize,
    pub persons: usize,
}

impl LoadReport {
    pub fn total(&self) -> usize {
        self.movies + self.genres + self.persons
    }
}

/// Loader that writes documents into the search engine.
///
/// The loader is responsible for:
/// - Opening a fresh search index client for every load
/// - Making sure every index exists with its mapping
/// - Sending one bulk upsert per index, all indices concurrently
pub struct IndexLoader {
    connector: Arc<dyn SearchIndexConnector>,
    indices: Vec<IndexDefinition>,
    retry: RetryPolicy,
}

impl IndexLoader {
    /// Create a new loader for the movies, genres and persons indices.
    pub fn new(connector: Arc<dyn SearchIndexConnector>) -> Self {
        Self {
            connector,
            indices: IndexDefinition::all(),
            retry: RetryPolicy::default(),
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn connect(&self) -> Result<Box<dyn SearchIndexProvider>, SyncError> {
        let connector = &self.connector;
        self.retry
            .run("connect to search index", move || connector.connect())
            .await
    }

    /// Create any missing index. Existing indices are left untouched.
    async fn ensure_indices(&self, provider: &dyn SearchIndexProvider) -> Result<(), SyncError> {
        for definition in &self.indices {
            let operation = format!("ensure index '{}'", definition.name);
            let created = self
                .retry
                .run(&operation, move || provider.ensure_index_exists(definition))
                .await?;

            if created {
                info!(index = %definition.name, "Created search index");
            } else {
                debug!(index = %definition.name, "Search index already exists");
            }
        }
        Ok(())
    }

    /// Upsert `documents` into `index`. Returns the number written.
    async fn load_index(
        &self,
        provider: &dyn SearchIndexProvider,
        index: &str,
        documents: Vec<BulkDocument>,
    ) -> Result<usize, SyncError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let operation = format!("bulk upsert into '{}'", index);
        let documents = &documents;
        let summary = self
            .retry
            .run(&operation, move || provider.bulk_upsert(index, documents))
            .await?;

        if summary.failed > 0 {
            warn!(
                index = %index,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Bulk upsert completed with some failures"
            );
            for result in summary.results.iter().filter(|r| !r.success) {
                if let Some(ref err) = result.error {
                    error!(
                        index = %index,
                        document_id = %result.document_id,
                        error = %err,
                        "Failed to index document"
                    );
                }
            }
            return Err(SyncError::PartialLoad {
                index: index.to_string(),
                failed_ids: summary.failed_ids(),
            });
        }

        debug!(index = %index, count = summary.succeeded, "Bulk upsert succeeded");
        Ok(summary.succeeded)
    }

    /// Write a batch into the search indices.
    ///
    /// Succeeds only if every document of every index was written.
    #[instrument(skip(self, batch), fields(documents = batch.len()))]
    pub async fn load(&self, batch: &DocumentBatch) -> Result<LoadReport, SyncError> {
        let movies = bulk_documents(&batch.movies)?;
        let genres = bulk_documents(&batch.genres)?;
        let persons = bulk_documents(&batch.persons)?;

        let provider = self.connect().await?;
        let provider = provider.as_ref();
        self.ensure_indices(provider).await?;

        let results = join_all([
            self.load_index(provider, MOVIES_INDEX, movies),
            self.load_index(provider, GENRES_INDEX, genres),
            self.load_index(provider, PERSONS_INDEX, persons),
        ])
        .await;

        let mut counts = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(count) => counts.push(count),
                Err(e) => {
                    if first_error.is_some() {
                        error!(error = %e, "Additional index load failure");
                    } else {
                        first_error = Some(e);
                    }
                    counts.push(0);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = LoadReport {
            movies: counts[0],
            genres: counts[1],
            persons: counts[2],
        };
        info!(
            movies = report.movies,
            genres = report.genres,
            persons = report.persons,
            "Loaded documents into search indices"
        );
        Ok(report)
    }

    /// Read a single document back from an index.
    pub async fn fetch_document(&self, index: &str, id: &str) -> Lookup<Value> {
        match self.connector.connect().await {
            Ok(provider) => provider.fetch_document(index, id).await,
            Err(e) => Lookup::ConnectionFailed(e.to_string()),
        }
    }
}

fn bulk_documents<D: SearchDocument>(documents: &[D]) -> Result<Vec<BulkDocument>, SearchIndexError> {
    documents.iter().map(BulkDocument::from_document).collect()
}
