//! Shared error types for the services crate.

use thiserror::Error;

use learn_core::model::IdError;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `WordService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WordServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    /// Every compare-and-swap attempt lost to a concurrent writer.
    #[error("learn progress still contended after {attempts} attempts")]
    Contention { attempts: u32 },
    /// The deterministic key is occupied by a record for a different pair.
    #[error("progress record {progress_id} belongs to another user or course")]
    ForeignRecord { progress_id: String },
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `PointService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PointServiceError {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `FlashcardSession`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FlashcardError {
    #[error(transparent)]
    Words(#[from] WordServiceError),
    #[error(transparent)]
    Progress(#[from] ProgressServiceError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
