//! Error types for the settlement layer.

use thiserror::Error;
use tollstream_types::{ErrorKind, SettlementModel};
use tollstream_x402::X402Error;

/// Result type alias for settlement operations.
pub type SettleResult<T> = Result<T, SettleError>;

/// Errors that can occur while talking to the settlement backend.
#[derive(Debug, Error)]
pub enum SettleError {
    /// Network error (retryable).
    #[error("network error: {0}")]
    Network(String),

    /// Timeout error (retryable).
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// Non-2xx, non-402 response from the backend.
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Detail extracted from the response body
        message: String,
    },

    /// The backend answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A client-side invariant was broken.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The settlement model cannot resolve a payment requirement.
    #[error("{model} settlement cannot resolve payment requirements")]
    UnsupportedResolution {
        /// Model in use
        model: SettlementModel,
    },

    /// A window was requested before the channel was opened.
    #[error("payment channel is not open")]
    ChannelNotOpen,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// x402 wire error.
    #[error("{0}")]
    X402(#[from] X402Error),
}

impl SettleError {
    /// Create a new Network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a new Timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new Server error.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a new MalformedResponse error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a new ProtocolViolation error.
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create a new Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }

    /// Classify this error for the session controller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout(_) => ErrorKind::Transient,
            Self::ProtocolViolation(_)
            | Self::UnsupportedResolution { .. }
            | Self::ChannelNotOpen => ErrorKind::ProtocolViolation,
            Self::Server { .. } | Self::MalformedResponse(_) | Self::Config(_) | Self::X402(_) => {
                ErrorKind::Terminal
            }
        }
    }

    /// Returns a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Network(_) => "Check connectivity to the backend, then resume",
            Self::Timeout(_) => "The backend is slow to answer; resume to try the window again",
            Self::Server { status: 401, .. } | Self::Server { status: 403, .. } => {
                "Refresh the access token in the configuration"
            }
            Self::Server { status: 404, .. } => "Check the content ID",
            Self::Server { .. } => "The backend rejected the request; check its logs",
            Self::MalformedResponse(_) => "The backend version may be incompatible",
            Self::ProtocolViolation(_) => "This is a client bug; please report it",
            Self::UnsupportedResolution { .. } => "Use the x402 settlement model to pay per window",
            Self::ChannelNotOpen => "Start the session before requesting windows",
            Self::Config(_) => "Fix the configuration file",
            Self::X402(e) => e.suggestion(),
        }
    }
}

impl From<reqwest::Error> for SettleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
