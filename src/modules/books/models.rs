use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use super::store::ValidationError;
use crate::utils::clock::iso_millis;

/// A catalogued book and its reading progress.
///
/// `year`, `author`, `summary` and `publisher` are opaque: whatever JSON
/// value the client sent is stored and echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Value>,
    pub page_count: u32,
    pub read_page: u32,
    /// Always `read_page == page_count`; recomputed on every write.
    pub finished: bool,
    pub reading: bool,
    #[serde(with = "iso_millis")]
    pub inserted_at: OffsetDateTime,
    #[serde(with = "iso_millis")]
    pub updated_at: OffsetDateTime,
}

impl Book {
    /// Overwrite every client-controlled field from `payload`.
    pub(crate) fn apply(&mut self, payload: BookPayload, name: String, at: OffsetDateTime) {
        self.name = name;
        self.year = payload.year;
        self.author = payload.author;
        self.summary = payload.summary;
        self.publisher = payload.publisher;
        self.page_count = payload.page_count;
        self.read_page = payload.read_page;
        self.reading = payload.reading;
        self.finished = self.read_page == self.page_count;
        self.updated_at = at;
    }
}

/// Body accepted by create and update. `finished`, `id` and timestamps are
/// not client-settable and are ignored if sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub year: Option<Value>,
    #[serde(default)]
    pub author: Option<Value>,
    #[serde(default)]
    pub summary: Option<Value>,
    #[serde(default)]
    pub publisher: Option<Value>,
    #[serde(default)]
    pub page_count: u32,
    #[serde(default)]
    pub read_page: u32,
    #[serde(default)]
    pub reading: bool,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("invalid book payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl BookPayload {
    /// Decode a request body. The name is checked before anything else is
    /// decoded, so a missing, blank or non-string name is reported as such
    /// whatever the other fields hold.
    pub fn from_json(body: Value) -> Result<Self, PayloadError> {
        let named = body
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|name| !name.trim().is_empty());
        if !named {
            return Err(ValidationError::NameRequired.into());
        }

        Ok(serde_json::from_value(body)?)
    }
}

/// Projection returned by the list operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<Value>,
}

impl From<&Book> for BookSummary {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id.clone(),
            name: book.name.clone(),
            publisher: book.publisher.clone(),
        }
    }
}

/// Optional list constraints, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Case-insensitive substring of the name. Empty means no constraint.
    pub name: Option<String>,
    pub reading: Option<bool>,
    pub finished: Option<bool>,
}

impl BookFilter {
    /// Query-string flag encoding: `"1"` is true, anything else false.
    pub fn flag(raw: &str) -> bool {
        raw == "1"
    }
}
