use chrono::{DateTime, Utc};
use reskill_core::model::{CourseKey, ProgressStatus, UserId};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{RemoteProgressRow, StorageError};

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<RemoteProgressRow, StorageError> {
    let user_id = UserId::new(row.try_get::<String, _>("user_id").map_err(ser)?).map_err(ser)?;
    let course_key =
        CourseKey::new(row.try_get::<String, _>("course_id").map_err(ser)?).map_err(ser)?;
    let status: ProgressStatus = row
        .try_get::<String, _>("status")
        .map_err(ser)?
        .parse()?;
    let started_at: Option<DateTime<Utc>> = row.try_get("started_at").map_err(ser)?;
    let completed_at: Option<DateTime<Utc>> = row.try_get("completed_at").map_err(ser)?;

    Ok(RemoteProgressRow {
        user_id,
        course_key,
        status,
        started_at,
        completed_at,
    })
}

/// Map every row, skipping (and logging) rows that fail validation.
pub(crate) fn map_progress_rows(rows: &[SqliteRow]) -> Vec<RemoteProgressRow> {
    rows.iter()
        .filter_map(|row| match map_progress_row(row) {
            Ok(mapped) => Some(mapped),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed learning_progress row");
                None
            }
        })
        .collect()
}
