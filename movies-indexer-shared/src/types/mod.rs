//! This module defines the core data structures shared across the movies indexer.
//! Raw source rows live in `source_rows`, indexed documents in the `*_document`
//! modules.

pub mod document;
pub mod genre_document;
pub mod lookup;
pub mod movie_document;
pub mod person_document;
pub mod source_rows;
pub mod watermark;
