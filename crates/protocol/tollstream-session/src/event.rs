//! Events and snapshots published by a session.

use serde::Serialize;
use tollstream_settle::ChannelSummary;
use tollstream_types::{Amount, ErrorKind, SessionState};
use tollstream_x402::PaymentRequired;

/// Something the caller may want to react to.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The session moved between states.
    StateChanged {
        /// Previous state.
        from: SessionState,
        /// New state.
        to: SessionState,
    },
    /// A window was charged.
    SpendDelta {
        /// Charge for this window.
        delta_minor: Amount,
        /// Total accrued after the charge.
        accrued_minor: Amount,
        /// Seconds the window covered.
        seconds: u64,
    },
    /// The backend wants a payment before the next window.
    PaymentRequired {
        /// The 402 body.
        requirement: PaymentRequired,
    },
    /// A non-payment failure stopped metering.
    Error {
        /// How the failure should be treated.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
    /// Money moved on-chain.
    Settled {
        /// Transaction identifier.
        transaction: String,
        /// Amount, when known.
        amount: Option<Amount>,
    },
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Current state.
    pub state: SessionState,
    /// Total charged so far.
    pub accrued_minor: Amount,
    /// Number of windows that granted playback time.
    pub windows_granted: u64,
    /// Final channel state, once a channel session is closed.
    pub channel: Option<ChannelSummary>,
}
