//! Movie document types for the search index.
//!
//! This module defines the denormalized film structure that is indexed in the
//! `movies` index.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::document::SearchDocument;

/// Role a person plays in a film.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Director,
    Actor,
    Writer,
}

impl PersonRole {
    /// Parse the role column of `person_film_work`. Unknown roles yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "director" => Some(Self::Director),
            "actor" => Some(Self::Actor),
            "writer" => Some(Self::Writer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Writer => "writer",
        }
    }
}

/// A person as embedded in a movie document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonRef {
    pub id: Uuid,
    pub name: String,
}

/// Document representation of a film in the search index.
///
/// Persons are partitioned by role. Each role list holds a person at most
/// once; the `*_names` lists mirror the role lists and exist for full-text
/// matching on names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieDocument {
    pub id: Uuid,
    pub imdb_rating: f64,
    pub title: String,
    pub description: Option<String>,
    pub genres: Vec<String>,
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub directors: Vec<PersonRef>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
}

impl MovieDocument {
    /// Create a document with no rating, description, genres or persons.
    ///
    /// # Example
    ///
    /// ```
    /// use movies_indexer_shared::MovieDocument;
    /// use uuid::Uuid;
    ///
    /// let doc = MovieDocument::new(Uuid::new_v4(), "Solaris");
    /// assert_eq!(doc.imdb_rating, 0.0);
    /// assert!(doc.actors.is_empty());
    /// ```
    pub fn new(id: Uuid, title: impl Into<String>) -> Self {
        Self {
            id,
            imdb_rating: 0.0,
            title: title.into(),
            description: None,
            genres: Vec::new(),
            directors_names: Vec::new(),
            actors_names: Vec::new(),
            writers_names: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
        }
    }

    /// Add a person under `role`.
    ///
    /// Returns `false` and leaves the document untouched if the same person is
    /// already listed under that role.
    pub fn add_person(&mut self, role: PersonRole, person: PersonRef) -> bool {
        let (people, names) = match role {
            PersonRole::Director => (&mut self.directors, &mut self.directors_names),
            PersonRole::Actor => (&mut self.actors, &mut self.actors_names),
            PersonRole::Writer => (&mut self.writers, &mut self.writers_names),
        };

        if people.iter().any(|p| p.id == person.id) {
            return false;
        }

        names.push(person.name.clone());
        people.push(person);
        true
    }

    /// Add a genre name unless it is already present.
    pub fn add_genre(&mut self, genre: impl Into<String>) -> bool {
        let genre = genre.into();
        if self.genres.contains(&genre) {
            return false;
        }
        self.genres.push(genre);
        true
    }
}

impl SearchDocument for MovieDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str, name: &str) -> PersonRef {
        PersonRef {
            id: Uuid::parse_str(id).unwrap(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_role_parse() {
        assert_eq!(PersonRole::parse("director"), Some(PersonRole::Director));
        assert_eq!(PersonRole::parse(" Actor "), Some(PersonRole::Actor));
        assert_eq!(PersonRole::parse("WRITER"), Some(PersonRole::Writer));
        assert_eq!(PersonRole::parse("producer"), None);
    }

    #[test]
    fn test_add_person_dedups_per_role() {
        let mut doc = MovieDocument::new(Uuid::new_v4(), "Stalker");
        let tarkovsky = person("550e8400-e29b-41d4-a716-446655440000", "Andrei Tarkovsky");

        assert!(doc.add_person(PersonRole::Director, tarkovsky.clone()));
        assert!(!doc.add_person(PersonRole::Director, tarkovsky.clone()));
        // Same person in another role is a separate entry.
        assert!(doc.add_person(PersonRole::Writer, tarkovsky));

        assert_eq!(doc.directors.len(), 1);
        assert_eq!(doc.directors_names, vec!["Andrei Tarkovsky"]);
        assert_eq!(doc.writers.len(), 1);
        assert!(doc.actors.is_empty());
    }

    #[test]
    fn test_add_genre_dedups() {
        let mut doc = MovieDocument::new(Uuid::new_v4(), "Stalker");
        assert!(doc.add_genre("Drama"));
        assert!(doc.add_genre("Sci-Fi"));
        assert!(!doc.add_genre("Drama"));
        assert_eq!(doc.genres, vec!["Drama", "Sci-Fi"]);
    }

    #[test]
    fn test_serialization_shape() {
        let mut doc = MovieDocument::new(
            Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap(),
            "Stalker",
        );
        doc.imdb_rating = 8.1;
        doc.add_person(
            PersonRole::Actor,
            person("550e8400-e29b-41d4-a716-446655440000", "Alisa Freindlich"),
        );

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["id"], "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
        assert_eq!(value["imdb_rating"], 8.1);
        assert!(value["description"].is_null());
        assert_eq!(value["actors"][0]["name"], "Alisa Freindlich");
        assert_eq!(value["actors_names"][0], "Alisa Freindlich");
        assert_eq!(doc.document_id(), "6ba7b810-9dad-11d1-80b4-00c04fd430c8");
    }
}
