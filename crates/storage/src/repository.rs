use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::memory::InMemoryStore;

/// Collection names used by the app.
pub mod collections {
    pub const COURSE_WORDS: &str = "course_words";
    pub const WORDS: &str = "words";
    pub const PROGRESS: &str = "progress";
    pub const POINTS: &str = "points";
}

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store refused or abandoned the request (permission, cancellation).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid path `{0}`")]
    InvalidPath(String),
}

//
// ─── PATHS ─────────────────────────────────────────────────────────────────────
//

/// Address of a document (`collection/id`) or one of its fields (`collection/id/field`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    collection: String,
    id: String,
    field: Option<String>,
}

fn check_segment(raw: &str, segment: &str) -> Result<(), StorageError> {
    if segment.is_empty() || segment.contains('/') {
        return Err(StorageError::InvalidPath(raw.to_owned()));
    }
    Ok(())
}

impl DocPath {
    /// Path of a whole document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPath` for empty segments or segments containing `/`.
    pub fn document(collection: &str, id: &str) -> Result<Self, StorageError> {
        let raw = format!("{collection}/{id}");
        check_segment(&raw, collection)?;
        check_segment(&raw, id)?;
        Ok(Self {
            collection: collection.to_owned(),
            id: id.to_owned(),
            field: None,
        })
    }

    /// Path of a single top-level field of a document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidPath` for empty segments or segments containing `/`.
    pub fn field(collection: &str, id: &str, field: &str) -> Result<Self, StorageError> {
        let mut path = Self::document(collection, id)?;
        check_segment(&format!("{path}/{field}"), field)?;
        path.field = Some(field.to_owned());
        Ok(path)
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}/{}/{}", self.collection, self.id, field),
            None => write!(f, "{}/{}", self.collection, self.id),
        }
    }
}

impl FromStr for DocPath {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [collection, id] => Self::document(collection, id),
            [collection, id, field] => Self::field(collection, id, field),
            _ => Err(StorageError::InvalidPath(s.to_owned())),
        }
    }
}

//
// ─── DOCUMENTS ─────────────────────────────────────────────────────────────────
//

/// A snapshot of one stored document: its key and JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub value: Value,
}

impl Document {
    #[must_use]
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Decode the body. A JSON `null` body decodes to `None`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        if self.value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(self.value.clone())
            .map(Some)
            .map_err(|e| StorageError::Serialization(format!("{}: {e}", self.id)))
    }

    /// Decode the body with the document key supplied as its `id` field,
    /// unless the body already carries one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the body does not match `T`.
    pub fn decode_keyed<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        match &self.value {
            Value::Object(map) if !map.contains_key("id") => {
                let mut map = map.clone();
                map.insert("id".to_owned(), Value::String(self.id.clone()));
                Document::new(self.id.clone(), Value::Object(map)).decode()
            }
            _ => self.decode(),
        }
    }
}

/// Serialize a record into a document body.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if `value` cannot be represented as JSON.
pub fn to_body<T: Serialize>(value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

//
// ─── CONTRACT ──────────────────────────────────────────────────────────────────
//

/// Path-addressed document store.
///
/// Every call reports exactly one outcome. No cross-document atomicity is
/// assumed; the two conditional writes are atomic per document only.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents in `collection` whose top-level `field` equals `value`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read. Zero matches is `Ok`.
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError>;

    /// Every document in `collection`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError>;

    /// Fetch one document by key; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    async fn get_by_id(&self, collection: &str, id: &str)
    -> Result<Option<Document>, StorageError>;

    /// Reserve a fresh unique key under `collection` without writing a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot allocate a key.
    async fn push_new(&self, collection: &str) -> Result<String, StorageError>;

    /// Unconditional overwrite. Writing `null` removes the target.
    ///
    /// A field path on a missing document creates the document.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn set_value(&self, path: &DocPath, value: Value) -> Result<(), StorageError>;

    /// Write the document only if no document exists under `id`.
    /// Returns `true` when this call created it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        value: Value,
    ) -> Result<bool, StorageError>;

    /// Write `value` only if the current value at `path` equals `expected`
    /// (`None` = absent). Field paths additionally require the document to exist.
    /// Returns `true` when the write happened.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, StorageError>;
}

/// Holds the document store behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub documents: Arc<dyn DocumentStore>,
}

impl Storage {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }
}
