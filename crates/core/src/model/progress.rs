use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::CourseKey;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown progress status: {0:?}")]
    UnknownStatus(String),

    #[error("completed record {0} has no completion timestamp")]
    MissingCompletedAt(CourseKey),
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Learner-facing state of a course key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    /// Storage representation shared by the local and remote replicas.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    /// Human label, e.g. for badges.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "Not Started",
            ProgressStatus::InProgress => "In Progress",
            ProgressStatus::Completed => "Completed",
        }
    }
}

impl FromStr for ProgressStatus {
    type Err = ProgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── RECORD ───────────────────────────────────────────────────────────────────
//

/// Completion state of one course key.
///
/// `started_at` is stamped once, on the first move into `InProgress`, and is
/// never overwritten. `completed_at` is present exactly when the status is
/// `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseProgress {
    course_key: CourseKey,
    status: ProgressStatus,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl CourseProgress {
    /// Computes the record that results from writing `status` to `key`.
    ///
    /// `existing` is the current record for the key, if any.
    #[must_use]
    pub fn next(
        existing: Option<&CourseProgress>,
        key: CourseKey,
        status: ProgressStatus,
        now: DateTime<Utc>,
    ) -> Self {
        let prior_start = existing.and_then(|p| p.started_at);
        let started_at = match (status, prior_start) {
            (ProgressStatus::InProgress, None) => Some(now),
            (_, prior) => prior,
        };
        let completed_at = (status == ProgressStatus::Completed).then_some(now);

        Self {
            course_key: key,
            status,
            started_at,
            completed_at,
        }
    }

    /// Rehydrate a record from one of the replicas.
    ///
    /// A stray `completed_at` on a non-completed record is dropped.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for unrecognised status strings
    /// and `ProgressError::MissingCompletedAt` for a completed record without
    /// a completion time.
    pub fn from_persisted(
        course_key: CourseKey,
        status: &str,
        started_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ProgressError> {
        let status: ProgressStatus = status.parse()?;
        let completed_at = match status {
            ProgressStatus::Completed => {
                Some(completed_at.ok_or_else(|| ProgressError::MissingCompletedAt(course_key.clone()))?)
            }
            ProgressStatus::NotStarted | ProgressStatus::InProgress => None,
        };

        Ok(Self {
            course_key,
            status,
            started_at,
            completed_at,
        })
    }

    #[must_use]
    pub fn course_key(&self) -> &CourseKey {
        &self.course_key
    }

    #[must_use]
    pub fn status(&self) -> ProgressStatus {
        self.status
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

//
// ─── TABLE ────────────────────────────────────────────────────────────────────
//

/// Every course key the learner has touched, keyed by `CourseKey`.
///
/// A key missing from the table reads as `NotStarted`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressTable {
    records: HashMap<CourseKey, CourseProgress>,
}

impl ProgressTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &CourseKey) -> Option<&CourseProgress> {
        self.records.get(key)
    }

    /// Status of `key`, treating absence as `NotStarted`.
    #[must_use]
    pub fn status_of(&self, key: &CourseKey) -> ProgressStatus {
        self.records
            .get(key)
            .map_or(ProgressStatus::NotStarted, CourseProgress::status)
    }

    /// Write `status` to `key` and return the stored record.
    pub fn apply(
        &mut self,
        key: CourseKey,
        status: ProgressStatus,
        now: DateTime<Utc>,
    ) -> CourseProgress {
        let updated = CourseProgress::next(self.records.get(&key), key.clone(), status, now);
        self.records.insert(key, updated.clone());
        updated
    }

    /// Insert a fully formed record, replacing any record under the same key.
    pub fn insert(&mut self, record: CourseProgress) {
        self.records.insert(record.course_key.clone(), record);
    }

    /// Copy every record of `other` over this table.
    pub fn overlay(&mut self, other: &ProgressTable) {
        for record in other.records.values() {
            self.insert(record.clone());
        }
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseProgress> {
        self.records.values()
    }

    #[must_use]
    pub fn stats(&self) -> ProgressStats {
        ProgressStats::from_statuses(self.records.values().map(CourseProgress::status))
    }
}

impl FromIterator<CourseProgress> for ProgressTable {
    fn from_iter<I: IntoIterator<Item = CourseProgress>>(iter: I) -> Self {
        let mut table = Self::new();
        for record in iter {
            table.insert(record);
        }
        table
    }
}

//
// ─── STATS ────────────────────────────────────────────────────────────────────
//

/// Counts over a set of progress records.
///
/// `total` includes keys that were written explicitly as `NotStarted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressStats {
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub not_started: usize,
}

impl ProgressStats {
    #[must_use]
    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = ProgressStatus>,
    {
        statuses
            .into_iter()
            .fold(Self::default(), |mut acc, status| {
                acc.total += 1;
                match status {
                    ProgressStatus::NotStarted => acc.not_started += 1,
                    ProgressStatus::InProgress => acc.in_progress += 1,
                    ProgressStatus::Completed => acc.completed += 1,
                }
                acc
            })
    }

    /// Completed share of `total`, as a rounded percentage.
    #[must_use]
    pub fn completion_rate(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rate = ((self.completed as f64 / self.total as f64) * 100.0).round() as u32;
        rate
    }
}
