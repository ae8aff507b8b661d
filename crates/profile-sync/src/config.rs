//! Configuration for profile syncing and the HTTP transport.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ProfileSyncError, Result};

/// Default base URL of the profile API.
pub const DEFAULT_API_URL: &str = "https://api.smooch.io/v1";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default minimum number of seconds between profile uploads.
const DEFAULT_UPLOAD_INTERVAL_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// App Config
// ─────────────────────────────────────────────────────────────────────────────

/// Application settings read by the profile updater.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub profile: ProfileConfig,
}

/// Profile sync settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    /// Whether profile changes are uploaded at all
    #[serde(default)]
    pub enabled: bool,
    /// Minimum number of seconds between upload attempts
    #[serde(default = "default_upload_interval")]
    pub upload_interval: u64,
}

fn default_upload_interval() -> u64 {
    DEFAULT_UPLOAD_INTERVAL_SECS
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            upload_interval: DEFAULT_UPLOAD_INTERVAL_SECS,
        }
    }
}

impl ProfileConfig {
    /// The debounce window as a `Duration`.
    pub fn upload_wait(&self) -> Duration {
        Duration::from_secs(self.upload_interval)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Config
// ─────────────────────────────────────────────────────────────────────────────

/// Settings for [`HttpProfileClient`](crate::HttpProfileClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the API, without a trailing slash
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Bearer token sent with every request, if any
    pub token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            token: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load settings from the environment.
    ///
    /// - `PROFILE_SYNC_API_URL`: base URL (defaults to [`DEFAULT_API_URL`])
    /// - `PROFILE_SYNC_TIMEOUT_SECS`: request timeout in seconds
    /// - `PROFILE_SYNC_TOKEN`: bearer token
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let base_url =
            read("PROFILE_SYNC_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout = match read("PROFILE_SYNC_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    ProfileSyncError::config(format!(
                        "PROFILE_SYNC_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                        raw
                    ))
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let config = Self::new(&base_url).with_timeout(timeout);
        Ok(match read("PROFILE_SYNC_TOKEN") {
            Some(token) => config.with_token(token),
            None => config,
        })
    }
}
