//! CLI error types.

use thiserror::Error;

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error enum wrapping all crate errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Settlement backend error.
    #[error("{0}")]
    Settlement(#[from] tollstream_settle::SettleError),

    /// Session command error.
    #[error("{0}")]
    Session(#[from] tollstream_session::SessionError),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// User-facing error with actionable message.
    #[error("{0}")]
    User(String),

    /// Configuration file already exists.
    #[error("Configuration already exists at {0}")]
    ConfigExists(String),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a user-facing error.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors: 1
            Self::User(_) | Self::ConfigExists(_) => 1,
            // Not found: 2
            Self::Settlement(tollstream_settle::SettleError::Server { status: 404, .. }) => 2,
            // Config errors: 3
            Self::Config(_) | Self::Toml(_) => 3,
            Self::Settlement(tollstream_settle::SettleError::Config(_)) => 3,
            // Payment errors: 4
            Self::Settlement(tollstream_settle::SettleError::Server { status: 402, .. }) => 4,
            // Settlement errors: 7
            Self::Settlement(_) => 7,
            // Session errors: 8
            Self::Session(_) => 8,
            // IO errors: 9
            Self::Io(_) => 9,
            // JSON/format errors: 10
            Self::Json(_) => 10,
        }
    }

    /// Recovery hint shown under the error line, when there is one.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Settlement(e) => Some(e.suggestion()),
            Self::Session(e) => Some(e.suggestion()),
            Self::Config(_) | Self::Toml(_) => Some("Fix the configuration file or pass --config"),
            Self::ConfigExists(_) => Some("Pass --force to overwrite it"),
            Self::Io(_) | Self::Json(_) | Self::User(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tollstream_settle::SettleError;
    use tollstream_session::SessionError;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::user("no").exit_code(), 1);
        assert_eq!(CliError::config("bad").exit_code(), 3);
        assert_eq!(
            CliError::from(SettleError::server(404, "Not found")).exit_code(),
            2
        );
        assert_eq!(
            CliError::from(SettleError::server(500, "boom")).exit_code(),
            7
        );
        assert_eq!(CliError::from(SessionError::Closed).exit_code(), 8);
    }

    #[test]
    fn test_suggestion_delegates_to_settlement() {
        let err = CliError::from(SettleError::server(401, "Unauthorized"));
        assert!(err.suggestion().unwrap().contains("token"));
        assert!(CliError::user("x").suggestion().is_none());
    }
}
