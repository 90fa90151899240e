//! Record transformer implementation.
//!
//! Turns raw source rows into MovieDocument, GenreDocument and PersonDocument
//! structures. Rows that fail validation are logged and skipped; they never
//! fail the batch.

use movies_indexer_shared::{
    ChangeSet, DocumentBatch, GenreDocument, MovieDocument, PersonDocument, PersonRef, PersonRole,
    RawGenreRow, RawMovieRow, RawPersonRow,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const MAX_RATING: f64 = 10.0;

/// Reason a row was not turned into a document.
#[derive(Debug, Error, PartialEq)]
pub enum RowRejection {
    #[error("id '{0}' is not a valid UUID")]
    InvalidId(String),

    #[error("{0} is missing or blank")]
    MissingField(&'static str),

    #[error("rating {0} is not a number between 0 and 10")]
    InvalidRating(f64),

    #[error("{field} is malformed: {reason}")]
    Malformed { field: &'static str, reason: String },
}

/// Documents built from one change set, plus the number of skipped rows.
#[derive(Debug, Default)]
pub struct Transformed {
    pub batch: DocumentBatch,
    pub rejected: usize,
}

#[derive(Deserialize)]
struct PersonEntry {
    person_id: Uuid,
    person_name: String,
    person_role: String,
}

#[derive(Deserialize)]
struct FilmEntry {
    film_id: Uuid,
    title: String,
    #[serde(default)]
    rating: Option<f64>,
    role: String,
}

/// Transformer that validates rows and builds search documents.
///
/// The transformer is stateless; it is a struct so the orchestrator can own
/// it alongside the other stages.
#[derive(Debug, Default)]
pub struct RecordTransformer;

impl RecordTransformer {
    /// Create a new record transformer.
    pub fn new() -> Self {
        Self
    }

    /// Transform a change set into documents, dropping invalid rows.
    pub fn transform(&self, changes: ChangeSet) -> DocumentBatch {
        self.transform_counted(changes).batch
    }

    /// Like [`transform`](Self::transform), but also reports how many rows
    /// were rejected.
    #[instrument(skip_all, fields(rows = changes.len()))]
    pub fn transform_counted(&self, changes: ChangeSet) -> Transformed {
        let mut rejected = 0;

        let movies = build_all(&changes.movies, "movie", |r| &r.id, movie_document, &mut rejected);
        let genres = build_all(&changes.genres, "genre", |r| &r.id, genre_document, &mut rejected);
        let persons = build_all(
            &changes.persons,
            "person",
            |r| &r.id,
            person_document,
            &mut rejected,
        );

        let batch = DocumentBatch {
            movies,
            genres,
            persons,
        };
        debug!(documents = batch.len(), rejected = rejected, "Transformed change set");

        Transformed { batch, rejected }
    }
}

fn build_all<R, D>(
    rows: &[R],
    kind: &'static str,
    id_of: fn(&R) -> &String,
    build: fn(&R) -> Result<D, RowRejection>,
    rejected: &mut usize,
) -> Vec<D> {
    let mut documents = Vec::with_capacity(rows.len());

    for row in rows {
        match build(row) {
            Ok(document) => documents.push(document),
            Err(reason) => {
                *rejected += 1;
                warn!(
                    kind = kind,
                    id = %id_of(row),
                    reason = %reason,
                    "Skipping invalid row"
                );
            }
        }
    }

    documents
}

fn parse_id(id: &str) -> Result<Uuid, RowRejection> {
    Uuid::parse_str(id).map_err(|_| RowRejection::InvalidId(id.to_string()))
}

fn required_text(value: Option<&str>, field: &'static str) -> Result<String, RowRejection> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(RowRejection::MissingField(field))
}

fn parse_rating(rating: Option<f64>) -> Result<f64, RowRejection> {
    match rating {
        None => Ok(0.0),
        Some(r) if r.is_finite() && (0.0..=MAX_RATING).contains(&r) => Ok(r),
        Some(r) => Err(RowRejection::InvalidRating(r)),
    }
}

/// Decode an aggregated JSON column. `null` counts as an empty list.
fn json_list<'a, T: Deserialize<'a>>(
    value: &'a Value,
    field: &'static str,
) -> Result<Vec<T>, RowRejection> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    Vec::<T>::deserialize(value).map_err(|e| RowRejection::Malformed {
        field,
        reason: e.to_string(),
    })
}

fn movie_document(row: &RawMovieRow) -> Result<MovieDocument, RowRejection> {
    let id = parse_id(&row.id)?;
    let title = required_text(row.title.as_deref(), "title")?;
    let rating = parse_rating(row.rating)?;
    let persons: Vec<PersonEntry> = json_list(&row.persons, "persons")?;
    let genres: Vec<Option<String>> = json_list(&row.genres, "genres")?;

    let mut document = MovieDocument::new(id, title);
    document.imdb_rating = rating;
    document.description = row.description.clone();

    for person in persons {
        let Some(role) = PersonRole::parse(&person.person_role) else {
            debug!(
                movie_id = %id,
                person_id = %person.person_id,
                role = %person.person_role,
                "Ignoring unknown person role"
            );
            continue;
        };
        document.add_person(
            role,
            PersonRef {
                id: person.person_id,
                name: person.person_name,
            },
        );
    }

    for genre in genres.into_iter().flatten() {
        let genre = genre.trim();
        if !genre.is_empty() {
            document.add_genre(genre);
        }
    }

    Ok(document)
}

fn genre_document(row: &RawGenreRow) -> Result<GenreDocument, RowRejection> {
    Ok(GenreDocument {
        id: parse_id(&row.id)?,
        name: required_text(row.name.as_deref(), "name")?,
        description: row.description.clone(),
    })
}

fn person_document(row: &RawPersonRow) -> Result<PersonDocument, RowRejection> {
    let id = parse_id(&row.id)?;
    let full_name = required_text(row.full_name.as_deref(), "full_name")?;
    let films: Vec<FilmEntry> = json_list(&row.films, "films")?;

    let mut document = PersonDocument::new(id, full_name);
    for film in films {
        let Some(role) = PersonRole::parse(&film.role) else {
            debug!(
                person_id = %id,
                film_id = %film.film_id,
                role = %film.role,
                "Ignoring unknown person role"
            );
            continue;
        };
        let rating = parse_rating(film.rating)?;
        document.add_film_role(film.film_id, &film.title, rating, role.as_str());
    }

    Ok(document)
}
