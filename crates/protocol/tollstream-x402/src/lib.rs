//! x402 Payment Required wire types for Tollstream.
//!
//! The challenge-response settlement model follows the
//! [x402 payment protocol](https://www.x402.org/): a window request without
//! credit is answered with HTTP 402 and a description of what payment would
//! satisfy it. The client pays (or obtains a signature) and retries.
//!
//! ```text
//! ┌─────────────┐   GET /content/{id}/stream    ┌──────────────┐
//! │  Session     │ ─────────────────────────────→│  Backend     │
//! │  Controller  │ ←─────────────────────────────│              │
//! │              │   402 + PaymentRequired body  │              │
//! │              │                               │              │
//! │              │   GET + Payment-Signature     │              │
//! │              │ ─────────────────────────────→│              │
//! │              │   200 + playback_url          │              │
//! │              │ ←─────────────────────────────│              │
//! │              │   + Payment-Response          │              │
//! └─────────────┘                               └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`types`]**: 402 body, accepted requirements, signature and receipt
//! - **[`error`]**: Decode errors with recovery suggestions

pub mod error;
pub mod types;

pub use error::{X402Error, X402Result};
pub use types::{
    PaymentReceipt, PaymentRequired, PaymentRequirement, PaymentSignature, ResourceInfo,
    HEADER_PAYMENT_RESPONSE, HEADER_PAYMENT_SIGNATURE, NETWORK_ARC_TESTNET, SCHEME_EXACT,
    X402_VERSION,
};
