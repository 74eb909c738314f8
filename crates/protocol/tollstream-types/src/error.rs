//! Error classification shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a failure should be handled by the caller.
///
/// Payment-required is deliberately absent: it is an expected outcome of a
/// window request, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or timeout failure. The caller may resume; the controller
    /// never retries on its own.
    Transient,
    /// An invariant was broken (signature reuse, overlapping requests,
    /// non-monotonic channel totals). Indicates a bug.
    ProtocolViolation,
    /// The backend rejected the request for a non-payment reason.
    Terminal,
}

impl ErrorKind {
    /// Get the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::ProtocolViolation => "protocol_violation",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from parsing textual representations of types in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Unknown settlement model name.
    #[error("unknown settlement model: {0} (expected 'channel' or 'x402')")]
    UnknownSettlementModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::ProtocolViolation.to_string(), "protocol_violation");
    }

    #[test]
    fn test_parse_error_message() {
        let err = ParseError::UnknownSettlementModel("foo".into());
        assert!(err.to_string().contains("foo"));
    }
}
