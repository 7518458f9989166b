use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument, warn};

use learn_core::model::{CourseId, ProgressId, UserId, Word};
use learn_core::study::{Step, StudyCursor};

use crate::error::FlashcardError;
use crate::progress_service::{LearnUpdate, ProgressService};
use crate::word_service::WordService;

/// Order in which resolved words are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CardOrder {
    /// As delivered by the resolver.
    #[default]
    Delivered,
    Shuffled,
}

/// Shuffle cards in place with the given RNG.
pub fn shuffle_cards<R: Rng + ?Sized>(cards: &mut [Word], rng: &mut R) {
    cards.shuffle(rng);
}

/// What happened after pressing "next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    pub step: Step,
    /// `None` while the session has no progress record to report to.
    pub update: Option<LearnUpdate>,
}

/// One pass through a course's flashcards, reporting learn progress as it goes.
pub struct FlashcardSession {
    progress: ProgressService,
    user_id: UserId,
    course_id: CourseId,
    progress_id: Option<ProgressId>,
    cards: Vec<Word>,
    cursor: StudyCursor,
}

impl FlashcardSession {
    /// Resolve the course's words and its progress record concurrently.
    ///
    /// A progress failure does not stop the session; it just runs without
    /// reporting (see `is_tracking`).
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Words` if the words cannot be resolved.
    #[instrument(skip(words, progress), fields(user_id = %user_id, course_id = %course_id))]
    pub async fn open(
        words: &WordService,
        progress: ProgressService,
        user_id: UserId,
        course_id: CourseId,
        order: CardOrder,
    ) -> Result<Self, FlashcardError> {
        let (progress_id, cards) = tokio::join!(
            progress.ensure_progress_record(&user_id, &course_id),
            words.resolve_words(&course_id),
        );

        let mut cards = cards?;
        if order == CardOrder::Shuffled {
            shuffle_cards(&mut cards, &mut rand::rng());
        }

        let progress_id = match progress_id {
            Ok(id) => Some(id),
            Err(err) => {
                warn!(error = %err, "progress record unavailable; not tracking");
                None
            }
        };

        Ok(Self::from_parts(progress, user_id, course_id, progress_id, cards))
    }

    /// Build a session from already-resolved parts.
    #[must_use]
    pub fn from_parts(
        progress: ProgressService,
        user_id: UserId,
        course_id: CourseId,
        progress_id: Option<ProgressId>,
        cards: Vec<Word>,
    ) -> Self {
        let cursor = StudyCursor::new(cards.len());
        Self {
            progress,
            user_id,
            course_id,
            progress_id,
            cards,
            cursor,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> &CourseId {
        &self.course_id
    }

    #[must_use]
    pub fn progress_id(&self) -> Option<&ProgressId> {
        self.progress_id.as_ref()
    }

    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.progress_id.is_some()
    }

    #[must_use]
    pub fn cards(&self) -> &[Word] {
        &self.cards
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Word> {
        self.cards.get(self.cursor.position())
    }

    /// Move forward and report the resulting percentage.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Progress` if the update fails. The cursor has
    /// already moved when that happens.
    pub async fn next(&mut self) -> Result<Advance, FlashcardError> {
        let step = self.cursor.advance();
        let update = match &self.progress_id {
            Some(id) => Some(
                self.progress
                    .update_learn_progress(id, step.percentage())
                    .await?,
            ),
            None => {
                debug!("no progress record; skipping report");
                None
            }
        };
        Ok(Advance { step, update })
    }

    /// Move back one card; the stored percentage is left alone.
    pub fn back(&mut self) -> bool {
        self.cursor.back()
    }
}
