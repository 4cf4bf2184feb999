//! Shared error types for the services crate.

use thiserror::Error;

use reskill_core::model::{CourseKey, ModuleId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ProgressStore::reconcile`.
///
/// Either variant leaves the in-memory table and local replica untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcileError {
    #[error("failed to push {key} to the remote store")]
    Push {
        key: CourseKey,
        #[source]
        source: StorageError,
    },
    #[error("failed to fetch the remote progress table")]
    Pull(#[source] StorageError),
}

/// Errors emitted by `CourseProgressService`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseProgressError {
    #[error("sign in to track your progress")]
    SignInRequired,
    #[error("course has no module {0}")]
    UnknownModule(ModuleId),
    #[error("project submission is empty")]
    EmptySubmission,
    #[error("complete every module before submitting the project")]
    ProjectLocked,
}

/// Errors emitted by `AdminProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdminServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
