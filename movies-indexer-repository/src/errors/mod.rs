//! Error types for the movies indexer repository.
//!
//! One error type per external system: the search index, the relational
//! source and the checkpoint file.

mod checkpoint_error;
mod search_index_error;
mod source_error;

pub use checkpoint_error::CheckpointError;
pub use search_index_error::SearchIndexError;
pub use source_error::SourceError;
