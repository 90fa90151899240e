//! # Movies Indexer Shared
//!
//! This crate defines shared data structures and types used across the movies
//! indexer crates: the raw rows pulled from the relational source, the typed
//! documents written to the search indices, and the synchronization watermark.

pub mod types;

pub use types::document::{DocumentBatch, SearchDocument};
pub use types::genre_document::GenreDocument;
pub use types::lookup::Lookup;
pub use types::movie_document::{MovieDocument, PersonRef, PersonRole};
pub use types::person_document::{PersonDocument, PersonFilm};
pub use types::source_rows::{ChangeSet, RawGenreRow, RawMovieRow, RawPersonRow};
pub use types::watermark::Watermark;
