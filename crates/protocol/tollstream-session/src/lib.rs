//! Metered streaming session controller.
//!
//! A session meters one viewer watching one content item in fixed
//! ten-second credit windows. Each window is authorized and charged through
//! a [`WindowAuthorizer`](tollstream_settle::WindowAuthorizer) before the
//! [`PlaybackGate`] is allowed to play it.
//!
//! ```text
//!   CreditClock ──fire──► SessionActor ──request──► WindowAuthorizer
//!                              │    ◄──result──────────┘
//!                              ├──resume/pause──► PlaybackGate
//!                              └──events────────► caller
//! ```
//!
//! # Guarantees
//!
//! - At most one window request is in flight per session.
//! - Accrued spend only increases, and only on a granted window.
//! - `stop()` is idempotent and closes server-side resources exactly once.
//! - Only `start`, `resume`, `resolve_payment` and the clock request
//!   windows; media events never do.
//!
//! # Example
//!
//! ```ignore
//! let config = SessionConfig::new("c-1".into(), 5);
//! let (handle, mut events) = SessionController::spawn(config, authorizer, Box::new(DetachedGate));
//! handle.start().await?;
//! while let Some(event) = events.recv().await {
//!     if let SessionEvent::SpendDelta { accrued_minor, .. } = event {
//!         println!("spent {}", accrued_minor);
//!     }
//! }
//! ```

pub mod clock;
pub mod controller;
pub mod error;
pub mod event;
pub mod gate;

pub use clock::CreditClock;
pub use controller::{SessionConfig, SessionController, SessionEvents, SessionHandle};
pub use error::{SessionError, SessionResult};
pub use event::{SessionEvent, SessionSnapshot};
pub use gate::{DetachedGate, PlaybackGate};
