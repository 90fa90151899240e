//! # Movies Indexer Repository
//!
//! This crate provides traits and implementations for the external systems the
//! movies indexer talks to:
//!
//! - the relational source of truth ([`MovieSource`], backed by PostgreSQL),
//! - the search index ([`SearchIndexProvider`], backed by OpenSearch/Elasticsearch),
//! - the durable watermark ([`CheckpointStore`], backed by a JSON file).

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod index_config;
pub mod interfaces;
pub mod opensearch;
pub mod postgres;
pub mod types;

pub use checkpoint::JsonFileCheckpointStore;
pub use config::{OpenSearchConfig, PostgresConfig};
pub use errors::{CheckpointError, SearchIndexError, SourceError};
pub use index_config::IndexDefinition;
pub use interfaces::{
    CheckpointStore, ExtractOptions, MovieSource, SearchIndexConnector, SearchIndexProvider,
};
pub use opensearch::{OpenSearchConnector, OpenSearchProvider};
pub use postgres::PostgresMovieSource;
pub use types::{BatchOperationResult, BatchOperationSummary, BulkDocument};
