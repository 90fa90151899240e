//! Interface definitions for the external systems.
//!
//! These traits allow for dependency injection and swappable implementations,
//! so the pipeline can be tested with in-memory mocks.

mod checkpoint_store;
mod movie_source;
mod search_index_provider;

pub use checkpoint_store::CheckpointStore;
pub use movie_source::{ExtractOptions, MovieSource};
pub use search_index_provider::{SearchIndexConnector, SearchIndexProvider};
