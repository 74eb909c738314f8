//! Settlement layer for Tollstream sessions.
//!
//! This crate talks to the streaming backend and turns its two payment
//! models into one capability, [`WindowAuthorizer`]:
//!
//! - [`ChannelTickAdapter`] opens a payment channel, ticks it once per
//!   window and closes it at the end.
//! - [`ChallengeAdapter`] requests each window from the x402 stream
//!   endpoint and resolves `402 Payment Required` answers by auto-pay or
//!   by a caller-supplied signature.
//!
//! # Backend
//!
//! The backend is abstracted by [`ContentApi`], [`ChannelApi`] and
//! [`StreamApi`]. [`HttpBackend`] implements all three over reqwest; tests
//! use the in-memory mock from `tollstream-test-utils`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollstream_settle::{BackendConfig, ChannelTickAdapter, HttpBackend, WindowAuthorizer};
//!
//! let config = BackendConfig::new("http://localhost:8000/api/v1", "token").with_viewer("v1");
//! let backend = Arc::new(HttpBackend::new(&config)?);
//! let mut adapter = ChannelTickAdapter::new(backend, "c-1".into(), &config.viewer_id);
//! adapter.open().await?;
//! let result = adapter.request_window().await;
//! ```
//!
//! # Retries
//!
//! Only the channel open is retried ([`RetryPolicy`]); it carries an
//! idempotency key. Window requests are never retried here, so a transient
//! failure reaches the session as an error instead of a silent second
//! charge.

pub mod api;
pub mod authorizer;
pub mod challenge;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;

pub use api::{ChannelApi, ChannelInfo, ContentApi, Gated, StreamApi, StreamGrant, TickReceipt};
pub use authorizer::{
    ChannelSummary, PaymentResolution, SettlementNote, WindowAuthorizer, WindowGrant, WindowResult,
};
pub use challenge::ChallengeAdapter;
pub use channel::ChannelTickAdapter;
pub use config::{BackendConfig, RetryConfig};
pub use error::{SettleError, SettleResult};
pub use http::{HttpBackend, HEADER_IDEMPOTENCY_KEY};
pub use retry::RetryPolicy;
