//! Search index settings and mappings.
//!
//! This module defines the fixed schema of the `movies`, `genres` and `persons`
//! indices. All three share the `ru_en` analyzer, which lowercases, drops
//! English and Russian stop words and stems both languages.

use serde_json::{json, Value};

/// Name of the films index.
pub const MOVIES_INDEX: &str = "movies";

/// Name of the genres index.
pub const GENRES_INDEX: &str = "genres";

/// Name of the persons index.
pub const PERSONS_INDEX: &str = "persons";

/// Name of the combined English/Russian analyzer.
pub const ANALYZER: &str = "ru_en";

/// An index name together with the body used to create it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDefinition {
    pub name: String,
    /// `{"settings": ..., "mappings": ...}` as accepted by the create-index API.
    pub body: Value,
}

impl IndexDefinition {
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn movies() -> Self {
        Self::new(MOVIES_INDEX, movies_index_settings())
    }

    pub fn genres() -> Self {
        Self::new(GENRES_INDEX, genres_index_settings())
    }

    pub fn persons() -> Self {
        Self::new(PERSONS_INDEX, persons_index_settings())
    }

    /// Every index the indexer writes to.
    pub fn all() -> Vec<Self> {
        vec![Self::movies(), Self::genres(), Self::persons()]
    }
}

/// Index-level settings shared by all indices.
pub fn analysis_settings() -> Value {
    json!({
        "refresh_interval": "1s",
        "analysis": {
            "filter": {
                "english_stop": {
                    "type": "stop",
                    "stopwords": "_english_"
                },
                "english_stemmer": {
                    "type": "stemmer",
                    "language": "english"
                },
                "english_possessive_stemmer": {
                    "type": "stemmer",
                    "language": "possessive_english"
                },
                "russian_stop": {
                    "type": "stop",
                    "stopwords": "_russian_"
                },
                "russian_stemmer": {
                    "type": "stemmer",
                    "language": "russian"
                }
            },
            "analyzer": {
                ANALYZER: {
                    "tokenizer": "standard",
                    "filter": [
                        "lowercase",
                        "english_stop",
                        "english_stemmer",
                        "english_possessive_stemmer",
                        "russian_stop",
                        "russian_stemmer"
                    ]
                }
            }
        }
    })
}

/// Analyzed text field with a `raw` keyword sub-field for sorting and exact match.
fn text_with_raw() -> Value {
    json!({
        "type": "text",
        "analyzer": ANALYZER,
        "fields": {
            "raw": { "type": "keyword" }
        }
    })
}

fn analyzed_text() -> Value {
    json!({ "type": "text", "analyzer": ANALYZER })
}

fn nested_persons() -> Value {
    json!({
        "type": "nested",
        "dynamic": "strict",
        "properties": {
            "id": { "type": "keyword" },
            "name": analyzed_text()
        }
    })
}

/// Settings and mappings for the `movies` index.
///
/// Persons are stored twice: as nested `{id, name}` objects for filtering by
/// person, and as flat name lists for full-text matching.
pub fn movies_index_settings() -> Value {
    json!({
        "settings": analysis_settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "imdb_rating": { "type": "float" },
                "genres": { "type": "keyword" },
                "title": text_with_raw(),
                "description": analyzed_text(),
                "directors_names": analyzed_text(),
                "actors_names": analyzed_text(),
                "writers_names": analyzed_text(),
                "directors": nested_persons(),
                "actors": nested_persons(),
                "writers": nested_persons()
            }
        }
    })
}

/// Settings and mappings for the `genres` index.
pub fn genres_index_settings() -> Value {
    json!({
        "settings": analysis_settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "name": text_with_raw(),
                "description": analyzed_text()
            }
        }
    })
}

/// Settings and mappings for the `persons` index.
pub fn persons_index_settings() -> Value {
    json!({
        "settings": analysis_settings(),
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "id": { "type": "keyword" },
                "full_name": text_with_raw(),
                "films": {
                    "type": "nested",
                    "dynamic": "strict",
                    "properties": {
                        "id": { "type": "keyword" },
                        "title": text_with_raw(),
                        "imdb_rating": { "type": "float" },
                        "roles": analyzed_text()
                    }
                }
            }
        }
    })
}
