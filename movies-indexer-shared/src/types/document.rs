//! Common traits and containers for indexed documents.

use serde::Serialize;

use crate::{GenreDocument, MovieDocument, PersonDocument};

/// A document that can be written to a search index.
///
/// The document id is the external `_id` in the index. Writing a document with
/// an id that already exists replaces it, which is what makes loads idempotent.
pub trait SearchDocument: Serialize + Send + Sync {
    fn document_id(&self) -> String;
}

/// Validated documents produced by one pass, grouped by target index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentBatch {
    pub movies: Vec<MovieDocument>,
    pub genres: Vec<GenreDocument>,
    pub persons: Vec<PersonDocument>,
}

impl DocumentBatch {
    pub fn len(&self) -> usize {
        self.movies.len() + self.genres.len() + self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
