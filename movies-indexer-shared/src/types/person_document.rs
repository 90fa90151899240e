//! Person document types for the `persons` index.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::document::SearchDocument;

/// A film as embedded in a person document, with every role the person had in it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonFilm {
    pub id: Uuid,
    pub title: String,
    pub imdb_rating: f64,
    pub roles: Vec<String>,
}

/// Document representation of a person in the search index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
    pub films: Vec<PersonFilm>,
}

impl PersonDocument {
    pub fn new(id: Uuid, full_name: impl Into<String>) -> Self {
        Self {
            id,
            full_name: full_name.into(),
            films: Vec::new(),
        }
    }

    /// Record that the person had `role` in a film.
    ///
    /// Films are merged by id, so a person who both directed and wrote a film
    /// gets one film entry with two roles. Repeated roles are ignored.
    pub fn add_film_role(&mut self, id: Uuid, title: &str, imdb_rating: f64, role: &str) {
        match self.films.iter_mut().find(|f| f.id == id) {
            Some(film) => {
                if !film.roles.iter().any(|r| r == role) {
                    film.roles.push(role.to_string());
                }
            }
            None => self.films.push(PersonFilm {
                id,
                title: title.to_string(),
                imdb_rating,
                roles: vec![role.to_string()],
            }),
        }
    }
}

impl SearchDocument for PersonDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}
