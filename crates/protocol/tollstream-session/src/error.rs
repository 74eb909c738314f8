//! Error types for session control.

use thiserror::Error;
use tollstream_types::SessionState;

/// Result type alias for session commands.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors returned by [`SessionHandle`](crate::SessionHandle) commands.
///
/// Failures of the window requests themselves are not returned here; they
/// arrive as [`SessionEvent::Error`](crate::SessionEvent::Error).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session is closed or closing.
    #[error("session is closed")]
    Closed,

    /// The session has not been started.
    #[error("session has not been started")]
    NotStarted,

    /// The command is not valid in the current state.
    #[error("cannot {op} while {state}")]
    InvalidState {
        /// Rejected command
        op: &'static str,
        /// State at the time
        state: SessionState,
    },
}

impl SessionError {
    /// Returns a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Closed => "Start a new session to keep watching",
            Self::NotStarted => "Call start() first",
            Self::InvalidState { .. } => "Wait for a payment-required event before resolving",
        }
    }
}
