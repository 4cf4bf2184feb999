//! Client for the hosted backend's REST interface (PostgREST dialect).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use reskill_core::model::{CourseKey, UserId};
use serde::{Deserialize, Serialize};

use crate::repository::{RemoteProgressRow, RemoteProgressStore, StorageError};

const SELECT_COLUMNS: &str = "user_id,course_id,status,started_at,completed_at";
const CONFLICT_COLUMNS: &str = "user_id,course_id";

#[derive(Clone, Debug)]
pub struct RestConfig {
    pub base_url: String,
    pub api_key: String,
    /// Bearer token of the signed-in session; falls back to `api_key`.
    pub access_token: Option<String>,
    pub table: String,
    pub timeout: Duration,
}

impl RestConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            access_token: None,
            table: "learning_progress".into(),
            timeout: Duration::from_secs(10),
        }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }
}

#[derive(Clone)]
pub struct RestProgressStore {
    client: Client,
    config: RestConfig,
}

impl RestProgressStore {
    /// Build a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the HTTP client cannot be built.
    pub fn new(config: RestConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(Self { client, config })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let token = self
            .config
            .access_token
            .as_deref()
            .unwrap_or(&self.config.api_key);
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == reqwest::StatusCode::CONFLICT {
            Err(StorageError::Conflict)
        } else {
            Err(StorageError::Status(status.as_u16()))
        }
    }

    async fn fetch(&self, request: RequestBuilder) -> Result<Vec<RemoteProgressRow>, StorageError> {
        let response = self.send(request).await?;
        let rows: Vec<WireRow> = response
            .json()
            .await
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        Ok(rows
            .into_iter()
            .filter_map(|wire| match RemoteProgressRow::try_from(wire) {
                Ok(row) => Some(row),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed remote progress row");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl RemoteProgressStore for RestProgressStore {
    async fn upsert(&self, row: &RemoteProgressRow) -> Result<(), StorageError> {
        let body = [WireRow::from(row)];
        let request = self
            .client
            .post(self.config.table_url())
            .query(&[("on_conflict", CONFLICT_COLUMNS)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body);
        self.send(request).await?;
        Ok(())
    }

    async fn select_all(&self, user_id: &UserId) -> Result<Vec<RemoteProgressRow>, StorageError> {
        let filter = format!("eq.{user_id}");
        let request = self
            .client
            .get(self.config.table_url())
            .query(&[("select", SELECT_COLUMNS), ("user_id", filter.as_str())]);
        self.fetch(request).await
    }

    async fn delete_all(&self, user_id: &UserId) -> Result<(), StorageError> {
        let filter = format!("eq.{user_id}");
        let request = self
            .client
            .delete(self.config.table_url())
            .query(&[("user_id", filter.as_str())]);
        self.send(request).await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<RemoteProgressRow>, StorageError> {
        let request = self
            .client
            .get(self.config.table_url())
            .query(&[("select", SELECT_COLUMNS), ("order", "created_at.desc")]);
        self.fetch(request).await
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireRow {
    user_id: String,
    course_id: String,
    status: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<&RemoteProgressRow> for WireRow {
    fn from(row: &RemoteProgressRow) -> Self {
        Self {
            user_id: row.user_id.as_str().to_owned(),
            course_id: row.course_key.as_str().to_owned(),
            status: row.status.as_str().to_owned(),
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

impl TryFrom<WireRow> for RemoteProgressRow {
    type Error = StorageError;

    fn try_from(wire: WireRow) -> Result<Self, Self::Error> {
        let ser = |err: reskill_core::model::IdError| StorageError::Serialization(err.to_string());
        Ok(Self {
            user_id: UserId::new(wire.user_id).map_err(ser)?,
            course_key: CourseKey::new(wire.course_id).map_err(ser)?,
            status: wire.status.parse()?,
            started_at: wire.started_at,
            completed_at: wire.completed_at,
        })
    }
}
