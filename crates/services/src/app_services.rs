use std::sync::Arc;

use learn_core::model::{CourseId, Percentage, ProgressId, UserId, Word};
use storage::repository::Storage;

use crate::Clock;
use crate::callback::{Callback, CallerToken, dispatch};
use crate::error::{AppServicesError, FlashcardError, ProgressServiceError, WordServiceError};
use crate::flashcards::{CardOrder, FlashcardSession};
use crate::point_service::PointService;
use crate::progress_service::{LearnUpdate, ProgressService, ProgressServiceConfig};
use crate::word_service::{WordService, WordServiceConfig};

/// Service-level knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServicesConfig {
    pub words: WordServiceConfig,
    pub progress: ProgressServiceConfig,
}

/// Assembles app-facing services over one document store.
#[derive(Clone)]
pub struct AppServices {
    words: Arc<WordService>,
    progress: Arc<ProgressService>,
    points: Arc<PointService>,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: &Storage, clock: Clock, config: ServicesConfig) -> Self {
        let words = WordService::new(Arc::clone(&storage.documents)).with_config(config.words);
        let progress =
            ProgressService::new(Arc::clone(&storage.documents)).with_config(config.progress);
        let points = PointService::new(clock, Arc::clone(&storage.documents));
        Self {
            words: Arc::new(words),
            progress: Arc::new(progress),
            points: Arc::new(points),
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: ServicesConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(&storage, clock, config))
    }

    #[must_use]
    pub fn words(&self) -> Arc<WordService> {
        Arc::clone(&self.words)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn points(&self) -> Arc<PointService> {
        Arc::clone(&self.points)
    }

    /// Start a flashcard pass for the pair.
    ///
    /// # Errors
    ///
    /// Returns `FlashcardError::Words` if the course cannot be resolved.
    pub async fn open_flashcards(
        &self,
        user_id: UserId,
        course_id: CourseId,
        order: CardOrder,
    ) -> Result<FlashcardSession, FlashcardError> {
        FlashcardSession::open(
            &self.words,
            ProgressService::clone(&self.progress),
            user_id,
            course_id,
            order,
        )
        .await
    }

    // ── callback-style entry points ───────────────────────────────────────────

    pub fn fetch_course_words(
        &self,
        course_id: CourseId,
        caller: CallerToken,
        callback: Callback<Vec<Word>, WordServiceError>,
    ) {
        let words = Arc::clone(&self.words);
        dispatch(
            caller,
            async move { words.resolve_words(&course_id).await },
            callback,
        );
    }

    pub fn fetch_progress_record(
        &self,
        user_id: UserId,
        course_id: CourseId,
        caller: CallerToken,
        callback: Callback<ProgressId, ProgressServiceError>,
    ) {
        let progress = Arc::clone(&self.progress);
        dispatch(
            caller,
            async move { progress.ensure_progress_record(&user_id, &course_id).await },
            callback,
        );
    }

    pub fn report_learn_progress(
        &self,
        progress_id: ProgressId,
        percentage: Percentage,
        caller: CallerToken,
        callback: Callback<LearnUpdate, ProgressServiceError>,
    ) {
        let progress = Arc::clone(&self.progress);
        dispatch(
            caller,
            async move { progress.update_learn_progress(&progress_id, percentage).await },
            callback,
        );
    }
}
