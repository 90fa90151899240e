//! # Movies Indexer
//!
//! Periodically copies changed movies, genres and persons from the PostgreSQL
//! content schema into OpenSearch, so the search index follows the database.
//!
//! ## Architecture
//!
//! Every pass runs the Extract-Transform-Load stages in order:
//!
//! 1. **Extractor**: Reads rows changed since the last watermark
//! 2. **Transformer**: Validates rows and builds search documents
//! 3. **Loader**: Upserts documents into the search indices
//! 4. **Orchestrator**: Runs passes on an interval and advances the watermark
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`extractor`]: Change extraction with retry
//! - [`transformer`]: Row validation and document building
//! - [`loader`]: Bulk indexing into OpenSearch
//! - [`orchestrator`]: The pass state machine and the sync loop
//! - [`retry`]: Bounded exponential backoff shared by extractor and loader
//! - [`errors`]: Error types for the sync pipeline

pub mod config;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod orchestrator;
pub mod retry;
pub mod transformer;

pub use config::{Dependencies, SyncConfig};
pub use errors::SyncError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Sync error.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
