use chrono::Utc;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use super::SqliteRepository;
use super::mapping::{conn, decode, document_from_row, encode, json_path};
use crate::repository::{DocPath, Document, DocumentStore, StorageError};

#[async_trait::async_trait]
impl DocumentStore for SqliteRepository {
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, body FROM documents
            WHERE collection = ?1 AND json_extract(body, ?2) = json_extract(?3, '$')
            ORDER BY id ASC
            ",
        )
        .bind(collection)
        .bind(json_path(field)?)
        .bind(encode(value)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(document_from_row).collect()
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, body FROM documents
            WHERE collection = ?1
            ORDER BY id ASC
            ",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(document_from_row).collect()
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let row = sqlx::query("SELECT id, body FROM documents WHERE collection = ?1 AND id = ?2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn push_new(&self, collection: &str) -> Result<String, StorageError> {
        // v7 keys are time-ordered, so `list` returns documents in creation order.
        let id = Uuid::now_v7().simple().to_string();
        debug!(collection, %id, "allocated document key");
        Ok(id)
    }

    async fn set_value(&self, path: &DocPath, value: Value) -> Result<(), StorageError> {
        let now = Utc::now();
        match (path.field_name(), value.is_null()) {
            (None, true) => {
                sqlx::query("DELETE FROM documents WHERE collection = ?1 AND id = ?2")
                    .bind(path.collection())
                    .bind(path.id())
                    .execute(&self.pool)
                    .await
                    .map_err(conn)?;
            }
            (None, false) => {
                sqlx::query(
                    r"
                    INSERT INTO documents (collection, id, body, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        body = excluded.body,
                        updated_at = excluded.updated_at
                    ",
                )
                .bind(path.collection())
                .bind(path.id())
                .bind(encode(&value)?)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
            }
            (Some(field), true) => {
                sqlx::query(
                    r"
                    UPDATE documents SET body = json_remove(body, ?3), updated_at = ?4
                    WHERE collection = ?1 AND id = ?2
                    ",
                )
                .bind(path.collection())
                .bind(path.id())
                .bind(json_path(field)?)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
            }
            (Some(field), false) => {
                sqlx::query(
                    r"
                    INSERT INTO documents (collection, id, body, updated_at)
                    VALUES (?1, ?2, json_object(?3, json(?5)), ?6)
                    ON CONFLICT(collection, id) DO UPDATE SET
                        body = json_set(documents.body, ?4, json(?5)),
                        updated_at = excluded.updated_at
                    ",
                )
                .bind(path.collection())
                .bind(path.id())
                .bind(field)
                .bind(json_path(field)?)
                .bind(encode(&value)?)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(conn)?;
            }
        }
        debug!(%path, "document write");
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        value: Value,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO documents (collection, id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(collection, id) DO NOTHING
            ",
        )
        .bind(collection)
        .bind(id)
        .bind(encode(&value)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected() == 1)
    }

    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, StorageError> {
        let now = Utc::now();
        let res = match (path.field_name(), expected) {
            (Some(field), expected) => {
                // NULL matches both a missing field and an explicit JSON null.
                let expected = encode(expected.unwrap_or(&Value::Null))?;
                let field_path = json_path(field)?;
                let query = if value.is_null() {
                    sqlx::query(
                        r"
                        UPDATE documents SET body = json_remove(body, ?3), updated_at = ?5
                        WHERE collection = ?1 AND id = ?2
                          AND json_extract(body, ?3) IS json_extract(?4, '$')
                        ",
                    )
                    .bind(path.collection())
                    .bind(path.id())
                    .bind(field_path)
                    .bind(expected)
                    .bind(now)
                } else {
                    sqlx::query(
                        r"
                        UPDATE documents SET body = json_set(body, ?3, json(?6)), updated_at = ?5
                        WHERE collection = ?1 AND id = ?2
                          AND json_extract(body, ?3) IS json_extract(?4, '$')
                        ",
                    )
                    .bind(path.collection())
                    .bind(path.id())
                    .bind(field_path)
                    .bind(expected)
                    .bind(now)
                    .bind(encode(&value)?)
                };
                query.execute(&self.pool).await.map_err(conn)?
            }
            (None, None) => {
                return self
                    .create_if_absent(path.collection(), path.id(), value)
                    .await;
            }
            (None, Some(expected)) => {
                let query = if value.is_null() {
                    sqlx::query(
                        r"
                        DELETE FROM documents
                        WHERE collection = ?1 AND id = ?2 AND json(body) = json(?3)
                        ",
                    )
                    .bind(path.collection())
                    .bind(path.id())
                    .bind(encode(expected)?)
                } else {
                    sqlx::query(
                        r"
                        UPDATE documents SET body = ?4, updated_at = ?5
                        WHERE collection = ?1 AND id = ?2 AND json(body) = json(?3)
                        ",
                    )
                    .bind(path.collection())
                    .bind(path.id())
                    .bind(encode(expected)?)
                    .bind(encode(&value)?)
                    .bind(now)
                };
                query.execute(&self.pool).await.map_err(conn)?
            }
        };

        let applied = res.rows_affected() == 1;
        debug!(%path, applied, "conditional write");
        Ok(applied)
    }
}

impl SqliteRepository {
    /// Current raw body of a document, bypassing the `DocumentStore` contract.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read or decoded.
    pub async fn raw_body(&self, collection: &str, id: &str) -> Result<Option<Value>, StorageError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ?1 AND id = ?2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(conn)?;
        row.map(|(body,)| decode(&body)).transpose()
    }
}
