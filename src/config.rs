//! Configuration types for appcenter-publish

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API base for the public App Center service
pub const DEFAULT_API_BASE_URL: &str = "https://api.appcenter.ms/v0.1";

/// Upper bound accepted for `polling.interval` (one day)
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound accepted for `api.request_timeout` (one day)
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Distribution service API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Versioned API base URL (default: "https://api.appcenter.ms/v0.1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Static API token sent as `X-API-Token` on every API-base call
    #[serde(default)]
    pub api_token: String,

    /// Per-request timeout (default: 60 seconds)
    ///
    /// Applies to every HTTP call, including individual chunk transfers.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_token: String::new(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Chunk transfer settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Number of chunk upload workers (None = host parallelism)
    #[serde(default)]
    pub workers: Option<usize>,
}

impl TransferConfig {
    /// Effective worker count: the configured value, or the host parallelism (at least 1)
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Release status polling policy
///
/// The service processes a committed upload asynchronously; the poller asks for
/// its status once per `interval` and gives up after `max_attempts` requests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed delay between status requests (default: 2 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Maximum number of status requests (default: 60)
    #[serde(default = "default_poll_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: default_poll_max_attempts(),
        }
    }
}

/// Main configuration for [`crate::Publisher`]
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig): base URL, token, timeouts
/// - [`transfer`](TransferConfig): chunk worker pool
/// - [`polling`](PollingConfig): release status polling policy
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Distribution service API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Chunk transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Release status polling policy
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Check that the configuration can drive a publication.
    pub fn validate(&self) -> Result<()> {
        if self.api.api_token.trim().is_empty() {
            return Err(config_error("API token must not be empty", "api.api_token"));
        }
        if let Err(e) = url::Url::parse(&self.api.base_url) {
            return Err(config_error(
                format!("invalid API base URL '{}': {}", self.api.base_url, e),
                "api.base_url",
            ));
        }
        if self.api.request_timeout.is_zero() || self.api.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(config_error(
                format!(
                    "request timeout must be between 1 and {} seconds",
                    MAX_REQUEST_TIMEOUT.as_secs()
                ),
                "api.request_timeout",
            ));
        }
        self.validate_pipeline()
    }

    /// Check the transfer and polling settings only.
    ///
    /// Used when the HTTP client is built by the caller, so `api` is not consulted.
    pub(crate) fn validate_pipeline(&self) -> Result<()> {
        if self.transfer.workers == Some(0) {
            return Err(config_error(
                "worker count must be at least 1",
                "transfer.workers",
            ));
        }
        if self.polling.interval.is_zero() {
            return Err(config_error(
                "polling interval must be greater than zero",
                "polling.interval",
            ));
        }
        if self.polling.interval > MAX_POLL_INTERVAL {
            return Err(config_error(
                format!(
                    "polling interval must not exceed {} seconds",
                    MAX_POLL_INTERVAL.as_secs()
                ),
                "polling.interval",
            ));
        }
        if self.polling.max_attempts == 0 {
            return Err(config_error(
                "polling max_attempts must be at least 1",
                "polling.max_attempts",
            ));
        }
        Ok(())
    }
}

fn config_error(message: impl Into<String>, key: &str) -> Error {
    Error::Config {
        message: message.into(),
        key: Some(key.to_string()),
    }
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_max_attempts() -> u32 {
    60
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
