use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::repository::{DocPath, Document, DocumentStore, StorageError};

type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// Read failure injected for a collection, optionally narrowed to one key.
#[derive(Debug, Clone)]
struct ReadFault {
    collection: String,
    id: Option<String>,
}

#[derive(Default)]
struct State {
    collections: Collections,
    next_id: u64,
    write_log: Vec<String>,
    read_faults: Vec<ReadFault>,
    write_faults: Vec<String>,
}

/// Simple in-memory document store for testing and prototyping.
///
/// Counts every successful write and can be told to fail reads or writes,
/// which is how service tests observe "no second write" and hard failures.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Seed a document directly, bypassing the write counter.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn insert(&self, collection: &str, id: &str, value: Value) -> Result<(), StorageError> {
        self.lock()?
            .collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.to_owned(), value);
        Ok(())
    }

    /// Make every read of `collection` fail, or only reads of `id` when given.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn fail_reads_of(&self, collection: &str, id: Option<&str>) -> Result<(), StorageError> {
        self.lock()?.read_faults.push(ReadFault {
            collection: collection.to_owned(),
            id: id.map(str::to_owned),
        });
        Ok(())
    }

    /// Make every write into `collection` fail.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the store lock is poisoned.
    pub fn fail_writes_of(&self, collection: &str) -> Result<(), StorageError> {
        self.lock()?.write_faults.push(collection.to_owned());
        Ok(())
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.state.lock().map_or(0, |s| s.write_log.len())
    }

    /// Paths of successful writes, oldest first.
    #[must_use]
    pub fn write_log(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.write_log.clone())
            .unwrap_or_default()
    }

    /// Current value at `path`, if any.
    #[must_use]
    pub fn value_at(&self, path: &DocPath) -> Option<Value> {
        let state = self.state.lock().ok()?;
        read_path(&state.collections, path)
    }
}

impl State {
    fn check_read(&self, collection: &str, id: Option<&str>) -> Result<(), StorageError> {
        let hit = self.read_faults.iter().any(|fault| {
            fault.collection == collection
                && match (&fault.id, id) {
                    (None, _) => true,
                    (Some(f), Some(id)) => f == id,
                    (Some(_), None) => false,
                }
        });
        if hit {
            return Err(StorageError::Unavailable(format!(
                "read of {collection} rejected"
            )));
        }
        Ok(())
    }

    fn check_write(&self, collection: &str) -> Result<(), StorageError> {
        if self.write_faults.iter().any(|c| c == collection) {
            return Err(StorageError::Unavailable(format!(
                "write to {collection} rejected"
            )));
        }
        Ok(())
    }

    fn documents(&self, collection: &str) -> impl Iterator<Item = Document> + '_ {
        self.collections
            .get(collection)
            .into_iter()
            .flatten()
            .map(|(id, value)| Document::new(id.clone(), value.clone()))
    }
}

fn read_path(collections: &Collections, path: &DocPath) -> Option<Value> {
    let doc = collections.get(path.collection())?.get(path.id())?;
    match path.field_name() {
        Some(field) => doc.get(field).cloned(),
        None => Some(doc.clone()),
    }
}

fn write_path(collections: &mut Collections, path: &DocPath, value: Value) {
    let docs = collections.entry(path.collection().to_owned()).or_default();
    match path.field_name() {
        None if value.is_null() => {
            docs.remove(path.id());
        }
        None => {
            docs.insert(path.id().to_owned(), value);
        }
        Some(field) => {
            let doc = docs
                .entry(path.id().to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !doc.is_object() {
                *doc = Value::Object(Map::new());
            }
            if let Value::Object(map) = doc {
                if value.is_null() {
                    map.remove(field);
                } else {
                    map.insert(field.to_owned(), value);
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        let state = self.lock()?;
        state.check_read(collection, None)?;
        Ok(state
            .documents(collection)
            .filter(|doc| doc.value.get(field) == Some(value))
            .collect())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let state = self.lock()?;
        state.check_read(collection, None)?;
        Ok(state.documents(collection).collect())
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        let state = self.lock()?;
        state.check_read(collection, Some(id))?;
        Ok(state
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|value| Document::new(id, value.clone())))
    }

    async fn push_new(&self, collection: &str) -> Result<String, StorageError> {
        let mut state = self.lock()?;
        state.next_id += 1;
        // zero-padded so keys sort in allocation order
        Ok(format!("{collection}-{:08}", state.next_id))
    }

    async fn set_value(&self, path: &DocPath, value: Value) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.check_write(path.collection())?;
        write_path(&mut state.collections, path, value);
        state.write_log.push(path.to_string());
        Ok(())
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        value: Value,
    ) -> Result<bool, StorageError> {
        let path = DocPath::document(collection, id)?;
        let mut state = self.lock()?;
        state.check_write(collection)?;
        if read_path(&state.collections, &path).is_some() {
            return Ok(false);
        }
        write_path(&mut state.collections, &path, value);
        state.write_log.push(path.to_string());
        Ok(true)
    }

    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        state.check_write(path.collection())?;
        if path.field_name().is_some() {
            let doc = DocPath::document(path.collection(), path.id())?;
            if read_path(&state.collections, &doc).is_none() {
                return Ok(false);
            }
        }
        // JSON null and absence compare equal, as in SQLite's `IS NULL`.
        let current = read_path(&state.collections, path).filter(|v| !v.is_null());
        if current.as_ref() != expected.filter(|v| !v.is_null()) {
            return Ok(false);
        }
        write_path(&mut state.collections, path, value);
        state.write_log.push(path.to_string());
        Ok(true)
    }
}
