//! Backend API traits.
//!
//! These traits abstract the streaming backend, allowing for:
//! - The reqwest-based [`HttpBackend`](crate::HttpBackend) in production
//! - An in-memory mock in tests
//!
//! Payment-required answers are not errors: calls that can be refused
//! with a 402 return [`Gated::PaymentRequired`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tollstream_types::{Amount, Content, ContentId};
use tollstream_x402::{PaymentReceipt, PaymentRequired, PaymentSignature};

use crate::error::SettleResult;

/// Outcome of a call the backend may refuse with a payment requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gated<T> {
    /// Access granted.
    Granted(T),
    /// Refused with HTTP 402.
    PaymentRequired(PaymentRequired),
}

/// Server-side state of a payment channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    /// Channel identifier.
    pub id: String,
    /// Content the channel pays for.
    pub content_id: String,
    /// Channel status as reported by the backend (e.g., "open", "closed").
    pub status: String,
    /// Rate locked in when the channel was opened.
    #[serde(rename = "price_per_second_locked")]
    pub locked_rate_minor: Amount,
    /// Seconds metered so far. Never decreases.
    pub total_seconds_streamed: u64,
    /// Amount owed so far.
    pub total_amount_owed: Amount,
    /// Amount already settled on-chain.
    pub total_amount_settled: Amount,
    /// Escrow contract, if any.
    pub escrow_address: Option<String>,
    /// Settlement token contract, if any.
    pub usdc_address: Option<String>,
}

impl ChannelInfo {
    /// Amount owed but not yet settled.
    pub fn outstanding(&self) -> Amount {
        self.total_amount_owed
            .saturating_sub(self.total_amount_settled)
    }
}

/// Answer to a channel tick or close.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReceipt {
    /// Channel state after the tick.
    #[serde(flatten)]
    pub channel: ChannelInfo,
    /// Seconds granted by this tick (0 when the server debounced it).
    #[serde(default)]
    pub tick_seconds: u64,
    /// Whether the server pushed accrued debt on-chain during this tick.
    #[serde(default)]
    pub did_settle: bool,
    /// Settlement transaction, when `did_settle`.
    #[serde(default)]
    pub settlement_tx_id: Option<String>,
    /// Settled amount, when `did_settle`.
    #[serde(default)]
    pub settlement_amount: Option<Amount>,
}

/// Playback access granted by the stream or pay endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamGrant {
    /// Where to play from.
    #[serde(default)]
    pub playback_url: Option<String>,
    /// Prepaid seconds left on the server after this grant.
    #[serde(default)]
    pub seconds_remaining: Option<u64>,
    /// Decoded `Payment-Response` header, if the backend sent one.
    #[serde(skip)]
    pub receipt: Option<PaymentReceipt>,
}

/// Catalog lookups.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Fetch a content item, including its per-second price.
    async fn get_content(&self, id: &ContentId) -> SettleResult<Content>;
}

/// Open/tick/close payment channels.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    /// Open (or reopen) the channel for a content item.
    ///
    /// The idempotency key lets the backend return the existing channel
    /// when the call is retried.
    async fn open_channel(
        &self,
        content_id: &ContentId,
        idempotency_key: &str,
    ) -> SettleResult<ChannelInfo>;

    /// Meter one window on an open channel.
    async fn tick_channel(&self, channel_id: &str) -> SettleResult<Gated<TickReceipt>>;

    /// Close the channel, settling whatever is outstanding.
    async fn close_channel(&self, channel_id: &str) -> SettleResult<TickReceipt>;
}

/// Challenge-response (x402) streaming.
#[async_trait]
pub trait StreamApi: Send + Sync {
    /// Request playback, optionally presenting a payment signature.
    async fn stream(
        &self,
        content_id: &ContentId,
        signature: Option<PaymentSignature>,
    ) -> SettleResult<Gated<StreamGrant>>;

    /// Ask the backend to pay for one window on the viewer's behalf.
    async fn pay(&self, content_id: &ContentId) -> SettleResult<StreamGrant>;
}
