//! Genre document stored in the `genres` index.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::document::SearchDocument;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl SearchDocument for GenreDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}
