//! Dependency initialization and wiring for the movies indexer.

use std::sync::Arc;

use tracing::info;

use crate::config::SyncConfig;
use crate::extractor::ChangeExtractor;
use crate::loader::IndexLoader;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::transformer::RecordTransformer;
use crate::IndexingError;
use movies_indexer_repository::{JsonFileCheckpointStore, OpenSearchConnector, PostgresMovieSource};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`SyncConfig::from_env`] for the variables read. No connection is
    /// opened here; the database and the search index are connected at the
    /// start of every pass.
    pub fn new() -> Result<Self, IndexingError> {
        let config = SyncConfig::from_env()?;
        Ok(Self::from_config(config))
    }

    /// Wire the production components for `config`.
    pub fn from_config(config: SyncConfig) -> Self {
        info!(
            db_host = %config.postgres.host,
            db_port = config.postgres.port,
            db_name = %config.postgres.dbname,
            opensearch_url = %config.opensearch.url,
            state_file = %config.state_file.display(),
            interval_secs = config.interval.as_secs(),
            page_size = ?config.page_size,
            "Initializing dependencies"
        );

        let source = PostgresMovieSource::new(&config.postgres);
        let extractor = ChangeExtractor::new(Arc::new(source)).with_page_size(config.page_size);

        let connector = OpenSearchConnector::new(config.opensearch.clone());
        let loader = IndexLoader::new(Arc::new(connector));

        let checkpoint = JsonFileCheckpointStore::new(&config.state_file);

        let orchestrator = Orchestrator::with_config(
            extractor,
            RecordTransformer::new(),
            loader,
            Arc::new(checkpoint),
            OrchestratorConfig {
                interval: config.interval,
                ..OrchestratorConfig::default()
            },
        );

        Self { orchestrator }
    }
}
