//! Raw rows as they come out of the relational source.
//!
//! These are deliberately loosely typed: identifiers are text and the
//! aggregated join columns are untyped JSON. Validation into documents happens
//! in the indexer's transformer.

use serde_json::Value;

use crate::types::watermark::Watermark;

/// One movie with its persons and genres aggregated into JSON arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMovieRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    /// Film work type (`movie`, `tv_show`, ...). Not indexed.
    pub kind: Option<String>,
    /// Array of `{"person_id", "person_name", "person_role"}` objects.
    pub persons: Value,
    /// Array of genre names.
    pub genres: Value,
}

/// One genre.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGenreRow {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// One person with the films they took part in aggregated into a JSON array.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPersonRow {
    pub id: String,
    pub full_name: Option<String>,
    /// Array of `{"film_id", "title", "rating", "role"}` objects, one per
    /// film/role pair.
    pub films: Value,
}

/// Everything extracted from the source in a single pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub movies: Vec<RawMovieRow>,
    pub genres: Vec<RawGenreRow>,
    pub persons: Vec<RawPersonRow>,
    /// The source's own clock at the moment the rows were read. Used as the
    /// next watermark so it is compared against timestamps from the same clock.
    pub observed_at: Option<Watermark>,
}

impl ChangeSet {
    /// Total number of rows across all entity kinds. `observed_at` is not a row.
    pub fn len(&self) -> usize {
        self.movies.len() + self.genres.len() + self.persons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
