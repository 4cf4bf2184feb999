use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reskill_core::model::{
    CourseKey, CourseProgress, ProgressStats, ProgressStatus, ProgressTable, UserId,
};
use storage::repository::{LocalSlot, RemoteProgressRow, RemoteProgressStore, Storage};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::replica;
use crate::Clock;
use crate::error::ReconcileError;

/// Slot key the local replica is stored under unless configured otherwise.
pub const DEFAULT_SLOT_KEY: &str = "learningProgress";

/// Result of a reconciliation attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Local records were pushed and the remote table replaced the local one.
    Merged { pushed: usize, pulled: usize },
    /// Another reconciliation was already in flight; nothing was done.
    AlreadyRunning,
    /// The identity changed before the pull finished; the fetched table was discarded.
    Superseded,
}

/// Writes made while a reconciliation is in flight, replayed over the
/// fetched remote table so they are not lost.
#[derive(Debug, Default)]
struct Journal {
    writes: ProgressTable,
    cleared: bool,
}

#[derive(Debug, Default)]
struct State {
    table: ProgressTable,
    user: Option<UserId>,
    /// Bumped on every change to `table`.
    generation: u64,
    journal: Option<Journal>,
}

struct Inner {
    clock: Clock,
    slot_key: String,
    slot: Arc<dyn LocalSlot>,
    remote: Arc<dyn RemoteProgressStore>,
    runtime: Handle,
    state: Mutex<State>,
    /// Generation last written to the local slot.
    persisted: tokio::sync::Mutex<u64>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    reconcile_gate: tokio::sync::Mutex<()>,
}

/// Learner progress for the current session.
///
/// The in-memory table is authoritative. Every write is mirrored to the
/// local slot and, while a user is signed in, to the remote store; both
/// mirrors are written in the background and their failures are logged,
/// never returned.
///
/// Construct one per session and hand clones to every consumer.
#[derive(Clone)]
pub struct ProgressStore {
    inner: Arc<Inner>,
}

impl ProgressStore {
    /// Load the local replica and build a store over `storage`.
    ///
    /// An unreadable or malformed replica yields an empty table.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub async fn open(storage: &Storage, clock: Clock, slot_key: impl Into<String>) -> Self {
        let slot_key = slot_key.into();
        let table = match storage.slot.read(&slot_key).await {
            Ok(Some(raw)) => replica::decode(&raw).unwrap_or_else(|error| {
                tracing::warn!(%error, slot_key = %slot_key, "local progress replica is malformed; starting empty");
                ProgressTable::new()
            }),
            Ok(None) => ProgressTable::new(),
            Err(error) => {
                tracing::warn!(%error, slot_key = %slot_key, "local progress replica unreadable; starting empty");
                ProgressTable::new()
            }
        };
        tracing::debug!(records = table.len(), "progress store opened");

        Self {
            inner: Arc::new(Inner {
                clock,
                slot_key,
                slot: Arc::clone(&storage.slot),
                remote: Arc::clone(&storage.remote),
                runtime: Handle::current(),
                state: Mutex::new(State {
                    table,
                    ..State::default()
                }),
                persisted: tokio::sync::Mutex::new(0),
                pending: Mutex::new(Vec::new()),
                reconcile_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn get_progress(&self, key: &CourseKey) -> Option<CourseProgress> {
        self.inner.lock_state().table.get(key).cloned()
    }

    /// Status of `key`, `NotStarted` when absent.
    #[must_use]
    pub fn status_of(&self, key: &CourseKey) -> ProgressStatus {
        self.inner.lock_state().table.status_of(key)
    }

    /// Write `status` to `key` and return the resulting record.
    ///
    /// The in-memory table is updated before this returns; the local and
    /// remote mirrors are updated in the background.
    pub fn set_progress(&self, key: CourseKey, status: ProgressStatus) -> CourseProgress {
        let now = self.inner.clock.now();
        let (record, user) = {
            let mut state = self.inner.lock_state();
            let record = state.table.apply(key, status, now);
            state.generation += 1;
            if let Some(journal) = state.journal.as_mut() {
                journal.writes.insert(record.clone());
            }
            (record, state.user.clone())
        };

        self.schedule_local_flush();
        if let Some(user) = user {
            let row = RemoteProgressRow::from_progress(&user, &record);
            let remote = Arc::clone(&self.inner.remote);
            self.spawn(async move {
                if let Err(error) = remote.upsert(&row).await {
                    tracing::warn!(
                        %error,
                        user_id = %row.user_id,
                        course_key = %row.course_key,
                        "remote progress upsert failed"
                    );
                }
            });
        }
        record
    }

    /// Forget every record: memory, local replica, and the signed-in user's
    /// remote rows. Each deletion is attempted independently.
    pub fn clear_progress(&self) {
        let user = {
            let mut state = self.inner.lock_state();
            state.table.clear();
            state.generation += 1;
            if let Some(journal) = state.journal.as_mut() {
                journal.writes.clear();
                journal.cleared = true;
            }
            state.user.clone()
        };

        self.schedule_local_flush();
        if let Some(user) = user {
            let remote = Arc::clone(&self.inner.remote);
            self.spawn(async move {
                if let Err(error) = remote.delete_all(&user).await {
                    tracing::warn!(%error, user_id = %user, "remote progress delete failed");
                }
            });
        }
    }

    #[must_use]
    pub fn get_stats(&self) -> ProgressStats {
        self.inner.lock_state().table.stats()
    }

    /// Copy of the whole table.
    #[must_use]
    pub fn snapshot(&self) -> ProgressTable {
        self.inner.lock_state().table.clone()
    }

    #[must_use]
    pub fn current_user(&self) -> Option<UserId> {
        self.inner.lock_state().user.clone()
    }

    /// Drop to local-only operation. The in-memory table is kept.
    pub fn sign_out(&self) {
        let mut state = self.inner.lock_state();
        state.user = None;
        state.journal = None;
    }

    /// Push local records for `user`, then replace the table with the
    /// user's remote table.
    ///
    /// Writes made while this runs are kept on top of the fetched table.
    ///
    /// # Errors
    ///
    /// Returns `ReconcileError` if the push or the pull fails. The table and
    /// local replica are left as they were; the user stays signed in and the
    /// next sign-in retries.
    pub async fn reconcile(&self, user: &UserId) -> Result<ReconcileOutcome, ReconcileError> {
        let Ok(_gate) = self.inner.reconcile_gate.try_lock() else {
            tracing::debug!(user_id = %user, "reconciliation already in flight");
            return Ok(ReconcileOutcome::AlreadyRunning);
        };

        let span = tracing::info_span!("reconcile", user_id = %user);
        let outcome = self.reconcile_locked(user).instrument(span).await;
        if outcome.is_err() {
            self.inner.lock_state().journal = None;
        }
        outcome
    }

    async fn reconcile_locked(&self, user: &UserId) -> Result<ReconcileOutcome, ReconcileError> {
        let local = {
            let mut state = self.inner.lock_state();
            state.user = Some(user.clone());
            state.journal = Some(Journal::default());
            state.table.clone()
        };

        for record in local.iter() {
            let row = RemoteProgressRow::from_progress(user, record);
            self.inner
                .remote
                .upsert(&row)
                .await
                .map_err(|source| ReconcileError::Push {
                    key: record.course_key().clone(),
                    source,
                })?;
        }
        tracing::debug!(pushed = local.len(), "local records pushed");

        let rows = self
            .inner
            .remote
            .select_all(user)
            .await
            .map_err(ReconcileError::Pull)?;

        let mut fetched = ProgressTable::new();
        for row in rows {
            let course_key = row.course_key.clone();
            match row.into_progress() {
                Ok(record) => fetched.insert(record),
                Err(error) => {
                    tracing::warn!(%error, %course_key, "skipping invalid remote progress row");
                }
            }
        }
        let pulled = fetched.len();

        {
            let mut state = self.inner.lock_state();
            let journal = state.journal.take().unwrap_or_default();
            if state.user.as_ref() != Some(user) {
                tracing::info!("identity changed during reconciliation; discarding fetched table");
                return Ok(ReconcileOutcome::Superseded);
            }
            let mut merged = if journal.cleared {
                ProgressTable::new()
            } else {
                fetched
            };
            merged.overlay(&journal.writes);
            state.table = merged;
            state.generation += 1;
        }
        self.schedule_local_flush();

        tracing::info!(pushed = local.len(), pulled, "progress reconciled");
        Ok(ReconcileOutcome::Merged {
            pushed: local.len(),
            pulled,
        })
    }

    /// Reconcile on every transition into a signed-in identity, including a
    /// switch from one user to another, and go local-only on sign-out.
    ///
    /// The returned task ends when the identity channel closes.
    pub fn watch_identity(&self, mut identity: watch::Receiver<Option<UserId>>) -> JoinHandle<()> {
        let store = self.clone();
        self.inner.runtime.spawn(async move {
            let mut last: Option<UserId> = None;
            loop {
                let current = identity.borrow_and_update().clone();
                match (&last, &current) {
                    (_, Some(user)) if last.as_ref() != Some(user) => {
                        if let Err(error) = store.reconcile(user).await {
                            tracing::warn!(%error, user_id = %user, "reconciliation failed; will retry on next sign-in");
                        }
                    }
                    (Some(_), None) => store.sign_out(),
                    _ => {}
                }
                last = current;

                if identity.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Wait for every background write scheduled so far.
    pub async fn settle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self
                    .inner
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                std::mem::take(&mut *pending)
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(error) = handle.await {
                    tracing::warn!(%error, "background progress write panicked");
                }
            }
        }
    }

    fn schedule_local_flush(&self) {
        let inner = Arc::clone(&self.inner);
        self.spawn(async move { inner.flush_local().await });
    }

    fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = self.inner.runtime.spawn(task);
        let mut pending = self
            .inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the current table to the local slot unless a newer generation
    /// is already there. An empty table removes the slot.
    async fn flush_local(&self) {
        let mut persisted = self.persisted.lock().await;
        let (generation, encoded) = {
            let state = self.lock_state();
            if state.generation <= *persisted {
                return;
            }
            let encoded = if state.table.is_empty() {
                None
            } else {
                Some(replica::encode(&state.table))
            };
            (state.generation, encoded)
        };

        let result = match encoded {
            None => self.slot.delete(&self.slot_key).await,
            Some(Ok(raw)) => self.slot.write(&self.slot_key, &raw).await,
            Some(Err(error)) => {
                tracing::warn!(%error, "failed to encode local progress replica");
                return;
            }
        };

        match result {
            Ok(()) => *persisted = generation,
            Err(error) => tracing::warn!(%error, "local progress replica write failed"),
        }
    }
}
