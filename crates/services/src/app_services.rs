use std::sync::Arc;

use storage::repository::{RemoteProgressStore, Storage};
use storage::rest::RestProgressStore;

use crate::Clock;
use crate::admin_service::AdminProgressService;
use crate::config::SyncConfig;
use crate::course_service::CourseProgressService;
use crate::error::AppServicesError;
use crate::identity::IdentityProvider;
use crate::progress::ProgressStore;

/// Assembles the progress layer for one application session.
#[derive(Clone)]
pub struct AppServices {
    identity: IdentityProvider,
    progress: ProgressStore,
    courses: Arc<CourseProgressService>,
    admin: Arc<AdminProgressService>,
}

impl AppServices {
    /// Build services over a `SQLite` local replica and, when configured,
    /// the hosted backend as remote.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: &SyncConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = match &config.backend {
            Some(backend) => {
                let remote: Arc<dyn RemoteProgressStore> =
                    Arc::new(RestProgressStore::new(backend.rest_config())?);
                tracing::info!(backend = %backend.base_url, "using hosted progress table");
                Storage::sqlite_with_remote(db_url, remote).await?
            }
            None => {
                tracing::info!("no backend configured; progress table kept in the local database");
                Storage::sqlite(db_url).await?
            }
        };
        Ok(Self::from_storage(&storage, clock, config).await)
    }

    /// Build services over already-assembled storage.
    pub async fn from_storage(storage: &Storage, clock: Clock, config: &SyncConfig) -> Self {
        let identity = IdentityProvider::new();
        let progress = ProgressStore::open(storage, clock, config.slot_key.clone()).await;
        // Detached: the task ends when `identity` and all its clones are dropped.
        drop(progress.watch_identity(identity.subscribe()));

        let courses = Arc::new(CourseProgressService::new(
            progress.clone(),
            identity.clone(),
        ));
        let admin = Arc::new(AdminProgressService::new(Arc::clone(&storage.remote)));

        Self {
            identity,
            progress,
            courses,
            admin,
        }
    }

    #[must_use]
    pub fn identity(&self) -> IdentityProvider {
        self.identity.clone()
    }

    #[must_use]
    pub fn progress(&self) -> ProgressStore {
        self.progress.clone()
    }

    #[must_use]
    pub fn courses(&self) -> Arc<CourseProgressService> {
        Arc::clone(&self.courses)
    }

    #[must_use]
    pub fn admin(&self) -> Arc<AdminProgressService> {
        Arc::clone(&self.admin)
    }

    /// Wait for background progress writes to land.
    pub async fn shutdown(&self) {
        self.progress.settle().await;
    }
}
