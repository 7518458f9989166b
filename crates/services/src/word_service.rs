use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use learn_core::model::{CourseId, CourseWord, Word};
use storage::repository::{DocumentStore, StorageError, collections};

use crate::error::WordServiceError;

/// Tuning for the per-word fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordServiceConfig {
    /// Upper bound on word fetches in flight at once; `None` issues them all together.
    pub max_concurrent_fetches: Option<NonZeroUsize>,
}

/// Resolves a course's link records into the words they point at.
#[derive(Clone)]
pub struct WordService {
    documents: Arc<dyn DocumentStore>,
    config: WordServiceConfig,
}

impl WordService {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            config: WordServiceConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: WordServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Fetch every word linked to `course_id`.
    ///
    /// All word fetches are issued without waiting on each other, and the
    /// result is produced only after every one of them has settled. Words
    /// come back in fetch completion order; shuffling is left to the caller.
    ///
    /// A course with no links yields an empty list. A link whose word is
    /// missing is dropped.
    ///
    /// # Errors
    ///
    /// Returns `WordServiceError::Storage` if the link query fails, or with the
    /// first failure observed among the word fetches. No partial list is
    /// returned in that case.
    #[instrument(skip(self), fields(course_id = %course_id))]
    pub async fn resolve_words(&self, course_id: &CourseId) -> Result<Vec<Word>, WordServiceError> {
        let links = self.course_links(course_id).await?;
        if links.is_empty() {
            debug!("course has no linked words");
            return Ok(Vec::new());
        }

        let in_flight = self
            .config
            .max_concurrent_fetches
            .map_or(links.len(), NonZeroUsize::get);
        let total = links.len();

        let mut settled = stream::iter(links)
            .map(|link| self.fetch_linked_word(link))
            .buffer_unordered(in_flight);

        let mut words = Vec::with_capacity(total);
        let mut first_failure: Option<StorageError> = None;
        while let Some(outcome) = settled.next().await {
            match outcome {
                Ok(Some(word)) => words.push(word),
                Ok(None) => {}
                Err(err) if first_failure.is_none() => first_failure = Some(err),
                Err(err) => debug!(error = %err, "discarding additional fetch failure"),
            }
        }

        if let Some(err) = first_failure {
            warn!(error = %err, "word fan-out failed");
            return Err(err.into());
        }

        debug!(links = total, resolved = words.len(), "resolved course words");
        Ok(words)
    }

    async fn course_links(&self, course_id: &CourseId) -> Result<Vec<CourseWord>, StorageError> {
        let docs = self
            .documents
            .query_equal(
                collections::COURSE_WORDS,
                "courseId",
                &Value::String(course_id.to_string()),
            )
            .await?;

        let mut links = Vec::with_capacity(docs.len());
        for doc in &docs {
            if let Some(link) = doc.decode_keyed::<CourseWord>()? {
                links.push(link);
            }
        }
        Ok(links)
    }

    async fn fetch_linked_word(&self, link: CourseWord) -> Result<Option<Word>, StorageError> {
        let doc = self
            .documents
            .get_by_id(collections::WORDS, link.word_id.as_str())
            .await?;

        let word = match doc {
            Some(doc) => doc.decode_keyed::<Word>()?,
            None => None,
        };
        if word.is_none() {
            warn!(link_id = %link.id, word_id = %link.word_id, "dropping link to missing word");
        }
        Ok(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use storage::memory::InMemoryStore;

    fn course(id: &str) -> CourseId {
        CourseId::new(id).unwrap()
    }

    fn seed_word(store: &InMemoryStore, id: &str, text: &str) {
        store
            .insert(
                collections::WORDS,
                id,
                json!({ "text": text, "meaning": format!("{text}-meaning") }),
            )
            .unwrap();
    }

    fn seed_link(store: &InMemoryStore, link_id: &str, course_id: &str, word_id: &str) {
        store
            .insert(
                collections::COURSE_WORDS,
                link_id,
                json!({ "courseId": course_id, "wordId": word_id }),
            )
            .unwrap();
    }

    fn service(store: &InMemoryStore) -> WordService {
        WordService::new(Arc::new(store.clone()))
    }

    fn sorted_ids(words: &[Word]) -> Vec<String> {
        let mut ids: Vec<String> = words.iter().map(|w| w.id.to_string()).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn course_without_links_resolves_to_empty() {
        let store = InMemoryStore::new();
        seed_word(&store, "w1", "uno");
        seed_link(&store, "l1", "other", "w1");

        let words = service(&store).resolve_words(&course("c1")).await.unwrap();
        assert!(words.is_empty());
    }

    #[tokio::test]
    async fn resolves_every_linked_word() {
        let store = InMemoryStore::new();
        for i in 1..=4 {
            seed_word(&store, &format!("w{i}"), &format!("word{i}"));
            seed_link(&store, &format!("l{i}"), "c1", &format!("w{i}"));
        }
        seed_word(&store, "w9", "unlinked");

        let words = service(&store).resolve_words(&course("c1")).await.unwrap();
        assert_eq!(sorted_ids(&words), vec!["w1", "w2", "w3", "w4"]);
        assert_eq!(words.iter().find(|w| w.id.as_str() == "w2").unwrap().text, "word2");
    }

    #[tokio::test]
    async fn dangling_link_is_dropped_not_failed() {
        let store = InMemoryStore::new();
        seed_word(&store, "w1", "uno");
        seed_word(&store, "w2", "dos");
        seed_link(&store, "l1", "c1", "w1");
        seed_link(&store, "l2", "c1", "w2");
        seed_link(&store, "l3", "c1", "gone");

        let words = service(&store).resolve_words(&course("c1")).await.unwrap();
        assert_eq!(sorted_ids(&words), vec!["w1", "w2"]);
    }

    #[tokio::test]
    async fn null_word_document_counts_as_missing() {
        let store = InMemoryStore::new();
        store.insert(collections::WORDS, "w1", Value::Null).unwrap();
        seed_link(&store, "l1", "c1", "w1");

        let words = service(&store).resolve_words(&course("c1")).await.unwrap();
        assert!(words.is_empty());
    }

    #[tokio::test]
    async fn one_failed_fetch_fails_the_whole_resolve() {
        let store = InMemoryStore::new();
        for i in 1..=3 {
            seed_word(&store, &format!("w{i}"), &format!("word{i}"));
            seed_link(&store, &format!("l{i}"), "c1", &format!("w{i}"));
        }
        store.fail_reads_of(collections::WORDS, Some("w2")).unwrap();

        let err = service(&store)
            .resolve_words(&course("c1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WordServiceError::Storage(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn failed_link_query_is_a_hard_failure() {
        let store = InMemoryStore::new();
        store.fail_reads_of(collections::COURSE_WORDS, None).unwrap();

        let result = service(&store).resolve_words(&course("c1")).await;
        assert!(matches!(result, Err(WordServiceError::Storage(_))));
    }

    #[tokio::test]
    async fn bounded_fan_out_still_resolves_everything() {
        let store = InMemoryStore::new();
        for i in 1..=7 {
            seed_word(&store, &format!("w{i}"), &format!("word{i}"));
            seed_link(&store, &format!("l{i}"), "c1", &format!("w{i}"));
        }
        let service = service(&store).with_config(WordServiceConfig {
            max_concurrent_fetches: NonZeroUsize::new(2),
        });

        let words = service.resolve_words(&course("c1")).await.unwrap();
        assert_eq!(words.len(), 7);
    }

    #[tokio::test]
    async fn output_order_is_stable_for_same_completion_order() {
        let store = InMemoryStore::new();
        for i in 1..=5 {
            seed_word(&store, &format!("w{i}"), &format!("word{i}"));
            seed_link(&store, &format!("l{i}"), "c1", &format!("w{i}"));
        }
        let service = service(&store);

        let first = service.resolve_words(&course("c1")).await.unwrap();
        let second = service.resolve_words(&course("c1")).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn word_missing_text_is_still_delivered() {
        let store = InMemoryStore::new();
        seed_word(&store, "w1", "uno");
        store
            .insert(collections::WORDS, "w2", json!({ "meaning": "two" }))
            .unwrap();
        seed_link(&store, "l1", "c1", "w1");
        seed_link(&store, "l2", "c1", "w2");

        let words = service(&store).resolve_words(&course("c1")).await.unwrap();
        assert_eq!(sorted_ids(&words), vec!["w1", "w2"]);
    }
}

