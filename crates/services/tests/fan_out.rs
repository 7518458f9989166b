use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use learn_core::model::CourseId;
use serde_json::{Value, json};
use services::{WordService, WordServiceConfig};
use storage::memory::InMemoryStore;
use storage::repository::{DocPath, Document, DocumentStore, StorageError, collections};
use tokio::sync::Barrier;

/// Delegates to an in-memory store, but every word fetch first waits on a
/// barrier and is tracked while in flight.
struct GatedStore {
    inner: InMemoryStore,
    gate: Option<Arc<Barrier>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl GatedStore {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            gate: None,
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn query_equal(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        self.inner.query_equal(collection, field, value).await
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        self.inner.list(collection).await
    }

    async fn get_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, StorageError> {
        if collection == collections::WORDS {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.wait().await;
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.get_by_id(collection, id).await
    }

    async fn push_new(&self, collection: &str) -> Result<String, StorageError> {
        self.inner.push_new(collection).await
    }

    async fn set_value(&self, path: &DocPath, value: Value) -> Result<(), StorageError> {
        self.inner.set_value(path, value).await
    }

    async fn create_if_absent(
        &self,
        collection: &str,
        id: &str,
        value: Value,
    ) -> Result<bool, StorageError> {
        self.inner.create_if_absent(collection, id, value).await
    }

    async fn compare_and_set(
        &self,
        path: &DocPath,
        expected: Option<&Value>,
        value: Value,
    ) -> Result<bool, StorageError> {
        self.inner.compare_and_set(path, expected, value).await
    }
}

fn seeded(words: usize) -> InMemoryStore {
    let store = InMemoryStore::new();
    for i in 0..words {
        store
            .insert(
                collections::WORDS,
                &format!("w{i}"),
                json!({ "text": format!("word{i}") }),
            )
            .unwrap();
        store
            .insert(
                collections::COURSE_WORDS,
                &format!("l{i}"),
                json!({ "courseId": "c1", "wordId": format!("w{i}") }),
            )
            .unwrap();
    }
    store
}

#[tokio::test]
async fn word_fetches_are_all_in_flight_together() {
    const LINKS: usize = 8;
    let mut store = GatedStore::new(seeded(LINKS));
    // Only releases once all fetches are waiting; a serial resolver would hang here.
    store.gate = Some(Arc::new(Barrier::new(LINKS)));
    let store = Arc::new(store);
    let service = WordService::new(Arc::clone(&store) as Arc<dyn DocumentStore>);

    let words = tokio::time::timeout(
        Duration::from_secs(5),
        service.resolve_words(&CourseId::new("c1").unwrap()),
    )
    .await
    .expect("fetches were serialized")
    .unwrap();

    assert_eq!(words.len(), LINKS);
    assert_eq!(store.peak.load(Ordering::SeqCst), LINKS);
}

#[tokio::test]
async fn bounded_fan_out_respects_limit() {
    let mut store = GatedStore::new(seeded(9));
    store.delay = Duration::from_millis(5);
    let store = Arc::new(store);
    let service = WordService::new(Arc::clone(&store) as Arc<dyn DocumentStore>).with_config(
        WordServiceConfig {
            max_concurrent_fetches: std::num::NonZeroUsize::new(3),
        },
    );

    let words = service
        .resolve_words(&CourseId::new("c1").unwrap())
        .await
        .unwrap();

    assert_eq!(words.len(), 9);
    let peak = store.peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight was {peak}");
    assert!(peak >= 2, "fan-out never overlapped");
}

#[tokio::test]
async fn failure_waits_for_every_fetch_to_settle() {
    const LINKS: usize = 5;
    let inner = seeded(LINKS);
    inner.fail_reads_of(collections::WORDS, Some("w0")).unwrap();
    let mut store = GatedStore::new(inner);
    store.gate = Some(Arc::new(Barrier::new(LINKS)));
    let store = Arc::new(store);
    let service = WordService::new(Arc::clone(&store) as Arc<dyn DocumentStore>);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        service.resolve_words(&CourseId::new("c1").unwrap()),
    )
    .await
    .expect("resolver stalled");

    assert!(matches!(result, Err(services::WordServiceError::Storage(_))));
    assert_eq!(store.in_flight.load(Ordering::SeqCst), 0);
}
