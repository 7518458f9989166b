use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{Document, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

/// `SQLite` JSON path for a top-level field.
///
/// Only `[A-Za-z0-9_]` is accepted so the path never needs quoting.
pub(crate) fn json_path(field: &str) -> Result<String, StorageError> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StorageError::InvalidPath(field.to_owned()));
    }
    Ok(format!("$.{field}"))
}

pub(crate) fn encode(value: &Value) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn decode(raw: &str) -> Result<Value, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn document_from_row(row: &SqliteRow) -> Result<Document, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let body: String = row.try_get("body").map_err(ser)?;
    Ok(Document::new(id, decode(&body)?))
}
