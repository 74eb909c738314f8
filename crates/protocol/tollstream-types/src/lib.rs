//! Data structures for Tollstream metered streaming sessions.
//!
//! This crate holds the types shared by every other Tollstream crate. It
//! contains no I/O and no business logic beyond small arithmetic helpers.
//!
//! # Module Organization
//!
//! - [`constants`] - Window length and other protocol constants
//! - [`content`] - Content identifiers and catalog entries
//! - [`session`] - Session states and settlement model selection
//! - [`error`] - Error classification shared across crates
//!
//! # Example
//!
//! ```
//! use tollstream_types::{window_charge, ContentId, SessionState, WINDOW_SECONDS};
//!
//! let id = ContentId::new("c-42");
//! assert_eq!(id.as_str(), "c-42");
//!
//! // 5 minor units per second over one window
//! assert_eq!(window_charge(5, WINDOW_SECONDS), Some(50));
//! assert!(!SessionState::Idle.is_terminal());
//! ```
//!
//! # Type Conventions
//!
//! - Money is always an integer [`Amount`] in the smallest currency unit
//! - Enums derive `Copy` and serialize as `snake_case`

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod content;
pub mod error;
pub mod session;

pub use constants::*;
pub use content::{Content, ContentId};
pub use error::{ErrorKind, ParseError};
pub use session::{SessionState, SettlementModel};

/// Amount in minor units (smallest indivisible unit of the settlement currency).
pub type Amount = u64;

/// Charge for `seconds` of playback at `rate_per_second` minor units.
///
/// Returns `None` on overflow.
pub fn window_charge(rate_per_second: Amount, seconds: u64) -> Option<Amount> {
    rate_per_second.checked_mul(seconds)
}
