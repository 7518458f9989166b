//! Demo course content: words plus the course → word links that reference them.

use learn_core::model::{CourseId, CourseWord, IdError, LinkId, Word, WordId};
use thiserror::Error;

use crate::repository::{DocPath, DocumentStore, StorageError, collections, to_body};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SeedError {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// (id suffix, text, meaning, pronunciation)
const DEMO_WORDS: [(&str, &str, &str, &str); 6] = [
    ("hola", "hola", "hello", "OH-lah"),
    ("gracias", "gracias", "thank you", "GRAH-syahs"),
    ("por-favor", "por favor", "please", "por fah-VOR"),
    ("adios", "adiós", "goodbye", "ah-DYOHS"),
    ("buenos-dias", "buenos días", "good morning", "BWEH-nohs DEE-ahs"),
    ("agua", "agua", "water", "AH-gwah"),
];

/// What a seeding run wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub course_id: CourseId,
    pub words: usize,
    pub links: usize,
}

/// Write the demo words and link each of them to `course_id`.
///
/// Keys are derived from the word and course, so re-running overwrites
/// instead of duplicating.
///
/// # Errors
///
/// Returns `SeedError` if ids are invalid or a write fails.
pub async fn seed_demo_course(
    store: &dyn DocumentStore,
    course_id: &CourseId,
) -> Result<SeedReport, SeedError> {
    for (suffix, text, meaning, pronunciation) in DEMO_WORDS {
        let word = Word {
            id: WordId::new(format!("w-{suffix}"))?,
            text: text.to_owned(),
            meaning: meaning.to_owned(),
            pronunciation: Some(pronunciation.to_owned()),
            audio: Some(format!("audio/{suffix}.mp3")),
        };
        store
            .set_value(
                &DocPath::document(collections::WORDS, word.id.as_str())?,
                to_body(&word)?,
            )
            .await?;

        let link = CourseWord {
            id: LinkId::new(format!("cw-{course_id}-{suffix}"))?,
            course_id: course_id.clone(),
            word_id: word.id.clone(),
        };
        store
            .set_value(
                &DocPath::document(collections::COURSE_WORDS, link.id.as_str())?,
                to_body(&link)?,
            )
            .await?;
    }

    tracing::info!(%course_id, words = DEMO_WORDS.len(), "seeded demo course");
    Ok(SeedReport {
        course_id: course_id.clone(),
        words: DEMO_WORDS.len(),
        links: DEMO_WORDS.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn seeding_twice_does_not_duplicate_links() {
        let store = InMemoryStore::new();
        let course = CourseId::new("spanish").unwrap();
        seed_demo_course(&store, &course).await.unwrap();
        let report = seed_demo_course(&store, &course).await.unwrap();

        let links = store
            .query_equal(collections::COURSE_WORDS, "courseId", &json!("spanish"))
            .await
            .unwrap();
        assert_eq!(links.len(), report.links);
        assert_eq!(
            store.list(collections::WORDS).await.unwrap().len(),
            report.words
        );
    }
}
