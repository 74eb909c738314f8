//! CLI configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tollstream_settle::{BackendConfig, RetryConfig};
use tollstream_types::{Amount, SettlementModel, DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT_SECS};

use crate::error::{CliError, CliResult};
use crate::output::OutputFormat;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "TOLLSTREAM_DATA_DIR";

/// Token placeholder written by `tollstream init`.
pub const DEFAULT_TOKEN: &str = "${TOLLSTREAM_TOKEN}";

/// Expand environment variables in a string.
/// Supports `${VAR_NAME}` syntax; unset variables are left as written.
fn expand_env_vars(input: &str) -> String {
    let Ok(re) = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}") else {
        return input.to_string();
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .to_string()
}

/// CLI configuration loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Backend connection.
    pub api: ApiConfig,
    /// Session defaults.
    pub session: SessionSection,
    /// Retry policy for channel opens.
    pub retry: RetryConfig,
    /// Display configuration.
    pub display: DisplayConfig,
}

impl CliConfig {
    /// Load configuration from a file.
    /// Environment variables in `${VAR}` format are expanded in the API
    /// section.
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;

        config.api.base_url = expand_env_vars(&config.api.base_url);
        config.api.token = expand_env_vars(&config.api.token);

        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> CliResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build the settlement backend configuration.
    pub fn backend_config(&self) -> CliResult<BackendConfig> {
        if self.api.token.contains("${") {
            return Err(CliError::config(format!(
                "api.token references an unset variable: {}",
                self.api.token
            )));
        }
        let config = BackendConfig {
            base_url: self.api.base_url.clone(),
            token: self.api.token.clone(),
            viewer_id: self.api.viewer_id.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            retry: self.retry,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Backend connection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API base URL.
    pub base_url: String,
    /// Bearer token; `${VAR}` references are expanded on load.
    pub token: String,
    /// Viewer identifier sent with channel opens.
    pub viewer_id: String,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token: DEFAULT_TOKEN.to_string(),
            viewer_id: "anonymous".to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Session defaults, overridable per `watch` invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Settlement model to use.
    pub model: SettlementModel,
    /// Pay x402 challenges without asking.
    pub auto_pay: bool,
    /// Stop watching once this much has accrued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_spend_minor: Option<Amount>,
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Output format when `--format` is not given.
    pub default_format: String,
    /// Print every session event while watching.
    pub show_events: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            default_format: "human".to_string(),
            show_events: false,
        }
    }
}

impl DisplayConfig {
    /// Parsed default format, falling back to human output.
    pub fn format(&self) -> OutputFormat {
        self.default_format.parse().unwrap_or_default()
    }
}

/// Get the base directory for Tollstream data.
pub fn default_base_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }

    directories::ProjectDirs::from("dev", "tollstream", "tollstream")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| {
            std::env::var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".tollstream")
        })
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    default_base_dir().join("config.toml")
}

/// Format a USDC amount given in minor units (6 decimals).
pub fn format_usdc(minor: Amount) -> String {
    let whole = minor / 1_000_000;
    let frac = minor % 1_000_000;
    format!("{}.{:06} USDC", whole, frac)
}
