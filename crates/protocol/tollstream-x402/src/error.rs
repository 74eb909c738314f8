//! Error types for x402 wire handling.

use thiserror::Error;

/// Result type for x402 operations.
pub type X402Result<T> = Result<T, X402Error>;

/// Errors that can occur while encoding or decoding x402 messages.
#[derive(Debug, Error)]
pub enum X402Error {
    /// A header value is not valid base64 JSON.
    #[error("malformed {header} header: {reason}")]
    MalformedHeader {
        /// Header name
        header: &'static str,
        /// Description of what's wrong
        reason: String,
    },

    /// The amount field is not a non-negative integer string.
    #[error("invalid payment amount: {amount:?}")]
    InvalidAmount {
        /// The offending amount
        amount: String,
    },

    /// The 402 body lists no acceptable payment requirement.
    #[error("payment required body has no accepted requirements")]
    NoAcceptedRequirement,

    /// JSON encode/decode failure.
    #[error("x402 JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl X402Error {
    /// Returns a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::MalformedHeader { .. } => "Check that the header is base64-encoded JSON",
            Self::InvalidAmount { .. } => "Amounts must be integer strings in minor units",
            Self::NoAcceptedRequirement => "The backend offered no way to pay; contact the operator",
            Self::Json(_) => "Check the payload format against the x402 protocol",
        }
    }
}
