//! Extractor module for the movies indexer.
//!
//! Pulls the rows changed since the watermark from the movie source.

use std::sync::Arc;

use movies_indexer_repository::{ExtractOptions, MovieSource};
use movies_indexer_shared::{ChangeSet, Watermark};
use tracing::{info, instrument};

use crate::errors::SyncError;
use crate::retry::RetryPolicy;

/// Reads changes from the source, retrying transient failures.
///
/// A fetch either returns the complete change set or an error; partially read
/// results are never handed on.
pub struct ChangeExtractor {
    source: Arc<dyn MovieSource>,
    retry: RetryPolicy,
    page_size: Option<u32>,
}

impl ChangeExtractor {
    /// Create a new extractor with the given source.
    pub fn new(source: Arc<dyn MovieSource>) -> Self {
        Self {
            source,
            retry: RetryPolicy::default(),
            page_size: None,
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read in pages of `page_size` rows instead of one batch per query.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Fetch everything changed after `watermark`, or everything when `None`.
    #[instrument(skip(self), fields(watermark = ?watermark))]
    pub async fn fetch(&self, watermark: Option<Watermark>) -> Result<ChangeSet, SyncError> {
        let options = ExtractOptions::since(watermark).with_page_size(self.page_size);
        options.validate()?;

        let source = &self.source;
        let options = &options;
        let changes = self
            .retry
            .run("extract changes", move || source.fetch_changes(options))
            .await?;

        info!(
            movies = changes.movies.len(),
            genres = changes.genres.len(),
            persons = changes.persons.len(),
            full_sync = watermark.is_none(),
            "Extracted changes"
        );
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use movies_indexer_repository::SourceError;
    use movies_indexer_shared::RawGenreRow;
    use std::sync::Mutex;

    struct RecordingSource {
        seen: Mutex<Vec<ExtractOptions>>,
    }

    #[async_trait]
    impl MovieSource for RecordingSource {
        async fn fetch_changes(&self, options: &ExtractOptions) -> Result<ChangeSet, SourceError> {
            self.seen.lock().unwrap().push(*options);
            Ok(ChangeSet {
                genres: vec![RawGenreRow {
                    id: "g1".to_string(),
                    name: Some("Drama".to_string()),
                    description: None,
                }],
                ..ChangeSet::default()
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_passes_watermark_and_page_size() {
        let source = Arc::new(RecordingSource {
            seen: Mutex::new(Vec::new()),
        });
        let extractor = ChangeExtractor::new(source.clone()).with_page_size(Some(100));
        let watermark = Watermark::now();

        let changes = extractor.fetch(Some(watermark)).await.unwrap();

        assert_eq!(changes.len(), 1);
        let seen = source.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].since, Some(watermark));
        assert_eq!(seen[0].page_size, Some(100));
    }

    #[tokio::test]
    async fn test_invalid_page_size_is_rejected_before_calling_source() {
        let source = Arc::new(RecordingSource {
            seen: Mutex::new(Vec::new()),
        });
        let extractor = ChangeExtractor::new(source.clone()).with_page_size(Some(0));

        let result = extractor.fetch(None).await;

        assert!(matches!(
            result,
            Err(SyncError::Source(SourceError::InvalidOptions(_)))
        ));
        assert!(source.seen.lock().unwrap().is_empty());
    }

    struct SlowSource;

    #[async_trait]
    impl MovieSource for SlowSource {
        async fn fetch_changes(&self, _options: &ExtractOptions) -> Result<ChangeSet, SourceError> {
            tokio::time::sleep(std::time::Duration::from_secs(6)).await;
            Ok(ChangeSet::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_running_fetch_is_not_cut_off() {
        let extractor = ChangeExtractor::new(Arc::new(SlowSource));

        let changes = extractor.fetch(None).await.unwrap();

        assert!(changes.is_empty());
    }
}
