//! Configuration for the settlement backend.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tollstream_types::{DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS};

use crate::error::{SettleError, SettleResult};

/// Connection settings for the streaming backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// API base URL (e.g., `http://localhost:8000/api/v1`).
    pub base_url: String,

    /// Bearer credential used on every call.
    pub token: String,

    /// Viewer identifier, used to build channel idempotency keys.
    pub viewer_id: String,

    /// HTTP timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,

    /// Retry policy for idempotent calls.
    pub retry: RetryConfig,
}

impl BackendConfig {
    /// Create a configuration for the given base URL and token.
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            token: token.to_string(),
            ..Default::default()
        }
    }

    /// Set the viewer identifier.
    pub fn with_viewer(mut self, viewer_id: &str) -> Self {
        self.viewer_id = viewer_id.to_string();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> SettleResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SettleError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.token.trim().is_empty() {
            return Err(SettleError::config("access token is empty"));
        }
        if self.timeout.is_zero() {
            return Err(SettleError::config("timeout must be greater than zero"));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettleError::config("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: String::new(),
            viewer_id: "anonymous".to_string(),
            timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Base delay between retries
    #[serde(with = "duration_millis")]
    pub base_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Serde helper for Duration as whole seconds.
mod duration_secs {
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
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Serde helper for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_empty_token() {
        let config = BackendConfig::new("http://localhost:8000/api/v1", "");
        assert!(matches!(config.validate(), Err(SettleError::Config(_))));

        let config = BackendConfig::new("http://localhost:8000/api/v1", "t");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = BackendConfig::new("localhost:8000", "t");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_serialize_as_numbers() {
        let config = BackendConfig::new("http://x", "t").with_viewer("v1");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["timeout"], 30);
        assert_eq!(json["retry"]["base_delay"], 500);
        assert_eq!(json["viewer_id"], "v1");

        let back: BackendConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.retry, RetryConfig::default());
    }
}
