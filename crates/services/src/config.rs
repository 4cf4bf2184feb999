use std::env;
use std::time::Duration;

use storage::rest::RestConfig;

use crate::progress::DEFAULT_SLOT_KEY;

const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;

/// Connection details for the hosted backend.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl BackendConfig {
    /// Read `RESKILL_BACKEND_URL` / `RESKILL_BACKEND_KEY`; `None` unless both are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = non_empty_var("RESKILL_BACKEND_URL")?;
        let api_key = non_empty_var("RESKILL_BACKEND_KEY")?;
        let timeout = env::var("RESKILL_REMOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(
                Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
                Duration::from_secs,
            );
        Some(Self {
            base_url,
            api_key,
            access_token: non_empty_var("RESKILL_ACCESS_TOKEN"),
            timeout,
        })
    }

    #[must_use]
    pub fn rest_config(&self) -> RestConfig {
        let mut config = RestConfig::new(self.base_url.clone(), self.api_key.clone());
        config.access_token = self.access_token.clone();
        config.timeout = self.timeout;
        config
    }
}

/// Everything the progress layer reads from the environment.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub slot_key: String,
    /// When `None`, the local database also plays the remote table.
    pub backend: Option<BackendConfig>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            slot_key: DEFAULT_SLOT_KEY.to_owned(),
            backend: None,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            slot_key: non_empty_var("RESKILL_SLOT_KEY").unwrap_or_else(|| DEFAULT_SLOT_KEY.into()),
            backend: BackendConfig::from_env(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
