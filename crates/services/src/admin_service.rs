use std::sync::Arc;

use reskill_core::model::ProgressStats;
use storage::repository::{RemoteProgressRow, RemoteProgressStore};

use crate::error::AdminServiceError;

/// Progress rows of every learner plus their aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminProgressReport {
    pub rows: Vec<RemoteProgressRow>,
    pub stats: ProgressStats,
}

/// Back-office view over the remote progress table.
#[derive(Clone)]
pub struct AdminProgressService {
    remote: Arc<dyn RemoteProgressStore>,
}

impl AdminProgressService {
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteProgressStore>) -> Self {
        Self { remote }
    }

    /// Load every remote row and count statuses.
    ///
    /// # Errors
    ///
    /// Returns `AdminServiceError::Storage` if the remote cannot be read.
    pub async fn report(&self) -> Result<AdminProgressReport, AdminServiceError> {
        let rows = self.remote.list_all().await?;
        let stats = ProgressStats::from_statuses(rows.iter().map(|row| row.status));
        Ok(AdminProgressReport { rows, stats })
    }
}
