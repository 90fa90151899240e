//! Transformer module for the movies indexer.
//!
//! Validates raw source rows and turns them into search documents.

mod record_transformer;

pub use record_transformer::{RecordTransformer, RowRejection, Transformed};
