use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reskill_core::model::{CourseKey, CourseProgress, ProgressError, ProgressStatus, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("remote rejected request with status {0}")]
    Status(u16),
}

impl From<ProgressError> for StorageError {
    fn from(err: ProgressError) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// One row of the remote `learning_progress` table.
///
/// Unique on `(user_id, course_key)`; the wire column for the key is
/// `course_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProgressRow {
    pub user_id: UserId,
    pub course_key: CourseKey,
    pub status: ProgressStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RemoteProgressRow {
    #[must_use]
    pub fn from_progress(user_id: &UserId, progress: &CourseProgress) -> Self {
        Self {
            user_id: user_id.clone(),
            course_key: progress.course_key().clone(),
            status: progress.status(),
            started_at: progress.started_at(),
            completed_at: progress.completed_at(),
        }
    }

    /// Convert the row back into a domain record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the row breaks the record
    /// invariants (e.g. completed without a completion time).
    pub fn into_progress(self) -> Result<CourseProgress, StorageError> {
        CourseProgress::from_persisted(
            self.course_key,
            self.status.as_str(),
            self.started_at,
            self.completed_at,
        )
        .map_err(StorageError::from)
    }
}

/// Device-local durable key/value slot.
#[async_trait]
pub trait LocalSlot: Send + Sync {
    /// Read the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be read.
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be written.
    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the slot cannot be written.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Remote progress table, scoped per user.
#[async_trait]
pub trait RemoteProgressStore: Send + Sync {
    /// Insert or overwrite the row for `(row.user_id, row.course_key)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote rejects or cannot be reached.
    async fn upsert(&self, row: &RemoteProgressRow) -> Result<(), StorageError>;

    /// Fetch every row belonging to `user_id`.
    ///
    /// Rows that fail validation are skipped, not returned as errors.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote rejects or cannot be reached.
    async fn select_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRow>, StorageError>;

    /// Delete every row belonging to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote rejects or cannot be reached.
    async fn delete_all(&self, user_id: &UserId) -> Result<(), StorageError>;

    /// Fetch rows of every user (admin reporting).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the remote rejects or cannot be reached.
    async fn list_all(&self) -> Result<Vec<RemoteProgressRow>, StorageError>;
}

/// Simple in-memory slot for tests and ephemeral sessions.
#[derive(Clone, Default)]
pub struct InMemorySlot {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemorySlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LocalSlot for InMemorySlot {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self
            .values
            .lock()
            .map_err(|_| StorageError::Connection("poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| StorageError::Connection("poisoned".into()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self
            .values
            .lock()
            .map_err(|_| StorageError::Connection("poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

/// In-memory stand-in for the hosted progress table.
#[derive(Clone, Default)]
pub struct InMemoryRemote {
    rows: Arc<Mutex<HashMap<(UserId, CourseKey), RemoteProgressRow>>>,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(UserId, CourseKey), RemoteProgressRow>>, StorageError>
    {
        self.rows
            .lock()
            .map_err(|_| StorageError::Connection("poisoned".into()))
    }
}

#[async_trait]
impl RemoteProgressStore for InMemoryRemote {
    async fn upsert(&self, row: &RemoteProgressRow) -> Result<(), StorageError> {
        self.lock()?
            .insert((row.user_id.clone(), row.course_key.clone()), row.clone());
        Ok(())
    }

    async fn select_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRow>, StorageError> {
        Ok(self
            .lock()?
            .values()
            .filter(|row| &row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<(), StorageError> {
        self.lock()?.retain(|(owner, _), _| owner != user_id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<RemoteProgressRow>, StorageError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

/// Bundle of the two collaborators the progress store needs.
#[derive(Clone)]
pub struct Storage {
    pub slot: Arc<dyn LocalSlot>,
    pub remote: Arc<dyn RemoteProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            slot: Arc::new(InMemorySlot::new()),
            remote: Arc::new(InMemoryRemote::new()),
        }
    }
}
