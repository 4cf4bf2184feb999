use async_trait::async_trait;
use chrono::Utc;
use reskill_core::model::UserId;

use super::SqliteRepository;
use super::mapping::map_progress_rows;
use crate::repository::{RemoteProgressRow, RemoteProgressStore, StorageError};

#[async_trait]
impl RemoteProgressStore for SqliteRepository {
    async fn upsert(&self, row: &RemoteProgressRow) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO learning_progress (user_id, course_id, status, started_at, completed_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, course_id) DO UPDATE SET
                status = excluded.status,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at
            ",
        )
        .bind(row.user_id.as_str())
        .bind(row.course_key.as_str())
        .bind(row.status.as_str())
        .bind(row.started_at)
        .bind(row.completed_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn select_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, status, started_at, completed_at
            FROM learning_progress
            WHERE user_id = ?1
            ORDER BY id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(map_progress_rows(&rows))
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM learning_progress WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<RemoteProgressRow>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, course_id, status, started_at, completed_at
            FROM learning_progress
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(map_progress_rows(&rows))
    }
}
