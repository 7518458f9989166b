use std::num::NonZeroU32;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use learn_core::model::{CourseId, Percentage, Progress, ProgressId, UserId};
use storage::repository::{DocPath, Document, DocumentStore, StorageError, collections, to_body};

use crate::error::ProgressServiceError;

const LEARN_PROGRESS_FIELD: &str = "learnProgress";
const DEFAULT_CAS_ATTEMPTS: NonZeroU32 = NonZeroU32::MIN.saturating_add(4);

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// How progress record keys are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProgressKeying {
    /// Scan the collection for the pair; allocate a fresh key when absent.
    ///
    /// Two concurrent first visits can both miss the scan and create duplicates.
    #[default]
    Allocated,
    /// Key is `"{user}_{course}"` (see `ProgressId::composite`), created with a
    /// create-if-absent write.
    Composite,
}

/// How learn-progress writes are guarded against concurrent writers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Read, compare, then write unconditionally.
    ///
    /// A concurrent writer landing between the read and the write can still
    /// be overwritten by a smaller value.
    #[default]
    LastWriterWins,
    /// Write only if the stored value is still the one read, retrying on conflict.
    CompareAndSwap { max_attempts: NonZeroU32 },
}

impl UpdateStrategy {
    #[must_use]
    pub fn compare_and_swap() -> Self {
        Self::CompareAndSwap {
            max_attempts: DEFAULT_CAS_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressServiceConfig {
    pub keying: ProgressKeying,
    pub update: UpdateStrategy,
}

impl ProgressServiceConfig {
    /// Composite keys plus compare-and-swap updates.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            keying: ProgressKeying::Composite,
            update: UpdateStrategy::compare_and_swap(),
        }
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// What `update_learn_progress` did. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnUpdate {
    Written { previous: Option<Percentage> },
    /// The stored value was already at or above the requested one.
    NotAdvanced { current: Option<Percentage> },
    /// No record under that id; nothing was written.
    MissingRecord,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Finds or creates the per-(user, course) progress record and moves its
/// learn percentage forward.
#[derive(Clone)]
pub struct ProgressService {
    documents: Arc<dyn DocumentStore>,
    config: ProgressServiceConfig,
}

impl ProgressService {
    #[must_use]
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            config: ProgressServiceConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProgressServiceConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> ProgressServiceConfig {
        self.config
    }

    /// Return the id of the progress record for the pair, creating a zeroed
    /// record if none exists.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the scan, key allocation, or
    /// write fails, and `ProgressServiceError::ForeignRecord` if a composite
    /// key is already held by a record for another pair.
    #[instrument(skip(self), fields(user_id = %user_id, course_id = %course_id))]
    pub async fn ensure_progress_record(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<ProgressId, ProgressServiceError> {
        match self.config.keying {
            ProgressKeying::Allocated => self.find_or_create_allocated(user_id, course_id).await,
            ProgressKeying::Composite => self.find_or_create_composite(user_id, course_id).await,
        }
    }

    /// Scan the whole progress collection for the pair.
    ///
    /// If several records match, the first in key order wins.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` if the collection cannot be read.
    pub async fn find_progress_record(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<ProgressId>, ProgressServiceError> {
        let docs = self.documents.list(collections::PROGRESS).await?;
        let mut matches = docs
            .iter()
            .filter(|doc| belongs_to(doc, user_id, course_id));

        let Some(first) = matches.next() else {
            return Ok(None);
        };
        let duplicates = matches.count();
        if duplicates > 0 {
            warn!(progress_id = %first.id, duplicates, "duplicate progress records for pair");
        }
        Ok(Some(ProgressId::new(first.id.clone())?))
    }

    /// Fetch a progress record by id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if the read fails or the record
    /// is malformed.
    pub async fn get_progress(
        &self,
        progress_id: &ProgressId,
    ) -> Result<Option<Progress>, ProgressServiceError> {
        let doc = self
            .documents
            .get_by_id(collections::PROGRESS, progress_id.as_str())
            .await?;
        match doc {
            Some(doc) => Ok(doc.decode::<Progress>()?),
            None => Ok(None),
        }
    }

    /// Read-only lookup of the pair's record under the configured keying.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if a read fails or the record
    /// is malformed.
    pub async fn lookup_progress(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<Option<(ProgressId, Progress)>, ProgressServiceError> {
        let progress_id = match self.config.keying {
            ProgressKeying::Composite => ProgressId::composite(user_id, course_id),
            ProgressKeying::Allocated => match self.find_progress_record(user_id, course_id).await? {
                Some(id) => id,
                None => return Ok(None),
            },
        };
        Ok(self
            .get_progress(&progress_id)
            .await?
            .map(|record| (progress_id, record)))
    }

    /// Raise the stored learn percentage to `percentage`.
    ///
    /// Values at or below the stored one are ignored, and a missing record is
    /// a silent no-op. Under `LastWriterWins` the comparison only guards
    /// against this call's own read being stale.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if a read or write fails, or
    /// `ProgressServiceError::Contention` when compare-and-swap attempts run out.
    #[instrument(skip(self), fields(progress_id = %progress_id, percentage = percentage.value()))]
    pub async fn update_learn_progress(
        &self,
        progress_id: &ProgressId,
        percentage: Percentage,
    ) -> Result<LearnUpdate, ProgressServiceError> {
        let path = DocPath::field(
            collections::PROGRESS,
            progress_id.as_str(),
            LEARN_PROGRESS_FIELD,
        )?;
        let target = Value::from(percentage.value());

        match self.config.update {
            UpdateStrategy::LastWriterWins => {
                let current = match self.read_learn_progress(progress_id).await? {
                    Some(current) => current,
                    None => return Ok(missing()),
                };
                if !percentage.advances(current) {
                    return Ok(not_advanced(current));
                }
                self.documents.set_value(&path, target).await?;
                debug!(previous = ?current, "learn progress written");
                Ok(LearnUpdate::Written { previous: current })
            }
            UpdateStrategy::CompareAndSwap { max_attempts } => {
                for attempt in 1..=max_attempts.get() {
                    let current = match self.read_learn_progress(progress_id).await? {
                        Some(current) => current,
                        None => return Ok(missing()),
                    };
                    if !percentage.advances(current) {
                        return Ok(not_advanced(current));
                    }
                    let expected = current.map(|p| Value::from(p.value()));
                    if self
                        .documents
                        .compare_and_set(&path, expected.as_ref(), target.clone())
                        .await?
                    {
                        debug!(previous = ?current, attempt, "learn progress swapped");
                        return Ok(LearnUpdate::Written { previous: current });
                    }
                    debug!(attempt, "learn progress changed concurrently; retrying");
                }
                warn!(attempts = max_attempts.get(), "giving up on contended learn progress");
                Err(ProgressServiceError::Contention {
                    attempts: max_attempts.get(),
                })
            }
        }
    }

    async fn find_or_create_allocated(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<ProgressId, ProgressServiceError> {
        if let Some(existing) = self.find_progress_record(user_id, course_id).await? {
            debug!(progress_id = %existing, "found progress record");
            return Ok(existing);
        }

        let progress_id = ProgressId::new(self.documents.push_new(collections::PROGRESS).await?)?;
        let record = Progress::new(user_id.clone(), course_id.clone());
        self.documents
            .set_value(
                &DocPath::document(collections::PROGRESS, progress_id.as_str())?,
                to_body(&record)?,
            )
            .await?;
        info!(progress_id = %progress_id, "created progress record");
        Ok(progress_id)
    }

    async fn find_or_create_composite(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<ProgressId, ProgressServiceError> {
        let progress_id = ProgressId::composite(user_id, course_id);
        let record = Progress::new(user_id.clone(), course_id.clone());
        let created = self
            .documents
            .create_if_absent(collections::PROGRESS, progress_id.as_str(), to_body(&record)?)
            .await?;
        if created {
            info!(progress_id = %progress_id, "created progress record");
            return Ok(progress_id);
        }

        let existing = self
            .documents
            .get_by_id(collections::PROGRESS, progress_id.as_str())
            .await?;
        if let Some(doc) = existing.filter(|doc| !doc.value.is_null()) {
            if !belongs_to(&doc, user_id, course_id) {
                warn!(progress_id = %progress_id, "composite key held by another pair");
                return Err(ProgressServiceError::ForeignRecord {
                    progress_id: progress_id.to_string(),
                });
            }
        }
        debug!(progress_id = %progress_id, "found progress record");
        Ok(progress_id)
    }

    /// `None` when the record is absent; `Some(None)` when it has no learn value yet.
    async fn read_learn_progress(
        &self,
        progress_id: &ProgressId,
    ) -> Result<Option<Option<Percentage>>, ProgressServiceError> {
        let doc = self
            .documents
            .get_by_id(collections::PROGRESS, progress_id.as_str())
            .await?;
        match doc {
            Some(doc) if !doc.value.is_null() => Ok(Some(learn_value(&doc)?)),
            _ => Ok(None),
        }
    }
}

fn belongs_to(doc: &Document, user_id: &UserId, course_id: &CourseId) -> bool {
    let field = |name: &str| doc.value.get(name).and_then(Value::as_str);
    field("userId") == Some(user_id.as_str()) && field("courseId") == Some(course_id.as_str())
}

fn learn_value(doc: &Document) -> Result<Option<Percentage>, StorageError> {
    match doc.value.get(LEARN_PROGRESS_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => raw
            .as_i64()
            .ok_or_else(|| StorageError::Serialization(format!("{}: learnProgress {raw}", doc.id)))
            .and_then(|v| {
                Percentage::try_from(v)
                    .map_err(|e| StorageError::Serialization(format!("{}: {e}", doc.id)))
            })
            .map(Some),
    }
}

fn missing() -> LearnUpdate {
    debug!("no progress record; dropping update");
    LearnUpdate::MissingRecord
}

fn not_advanced(current: Option<Percentage>) -> LearnUpdate {
    debug!(current = ?current, "learn progress not advanced; skipping write");
    LearnUpdate::NotAdvanced { current }
}
