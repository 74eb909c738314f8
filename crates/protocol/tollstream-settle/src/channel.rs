//! Channel-tick settlement.
//!
//! One channel per session: opened once, ticked once per window, closed
//! once. The server owns the running totals; the adapter only checks that
//! they move forward.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use tollstream_types::{ContentId, SettlementModel};

use crate::api::{ChannelApi, Gated, TickReceipt};
use crate::authorizer::{ChannelSummary, SettlementNote, WindowAuthorizer, WindowGrant, WindowResult};
use crate::error::{SettleError, SettleResult};
use crate::retry::RetryPolicy;

/// [`WindowAuthorizer`] over an open/tick/close payment channel.
pub struct ChannelTickAdapter<A> {
    api: Arc<A>,
    content_id: ContentId,
    viewer_id: String,
    retry: RetryPolicy,
    channel_id: Option<String>,
    last_total_seconds: u64,
    closed: bool,
}

impl<A: ChannelApi> ChannelTickAdapter<A> {
    /// Create an adapter for one viewer watching one content item.
    pub fn new(api: Arc<A>, content_id: ContentId, viewer_id: impl Into<String>) -> Self {
        Self {
            api,
            content_id,
            viewer_id: viewer_id.into(),
            retry: RetryPolicy::default(),
            channel_id: None,
            last_total_seconds: 0,
            closed: false,
        }
    }

    /// Use a custom retry policy for the channel open.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Key the backend uses to deduplicate opens for this session.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}", self.content_id, self.viewer_id)
    }

    /// The open channel, if any.
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    fn on_tick(&mut self, receipt: TickReceipt) -> WindowResult {
        let total = receipt.channel.total_seconds_streamed;
        if total < self.last_total_seconds {
            error!(
                channel_id = ?self.channel_id,
                previous = self.last_total_seconds,
                reported = total,
                "Channel total went backwards"
            );
            return WindowResult::Error(SettleError::protocol_violation(format!(
                "total_seconds_streamed decreased from {} to {}",
                self.last_total_seconds, total
            )));
        }
        self.last_total_seconds = total;

        let settlement = match (receipt.did_settle, receipt.settlement_tx_id) {
            (true, Some(transaction)) => Some(SettlementNote {
                transaction,
                amount: receipt.settlement_amount,
            }),
            (true, None) => {
                warn!("Tick reported a settlement without a transaction id");
                None
            }
            _ => None,
        };

        debug!(tick_seconds = receipt.tick_seconds, total_seconds = total, "Window granted");
        WindowResult::Granted(WindowGrant {
            seconds: receipt.tick_seconds,
            playback_reference: None,
            settlement,
        })
    }
}

#[async_trait]
impl<A: ChannelApi + 'static> WindowAuthorizer for ChannelTickAdapter<A> {
    fn model(&self) -> SettlementModel {
        SettlementModel::Channel
    }

    async fn open(&mut self) -> SettleResult<()> {
        if self.channel_id.is_some() {
            return Ok(());
        }

        let key = self.idempotency_key();
        let api = &self.api;
        let content_id = &self.content_id;
        let key_ref = key.as_str();
        let channel = self
            .retry
            .execute("channel_open", move || api.open_channel(content_id, key_ref))
            .await?;

        info!(channel_id = %channel.id, key = %key, "Session channel ready");
        self.last_total_seconds = channel.total_seconds_streamed;
        self.channel_id = Some(channel.id);
        Ok(())
    }

    async fn request_window(&mut self) -> WindowResult {
        let Some(channel_id) = self.channel_id.clone() else {
            return WindowResult::Error(SettleError::ChannelNotOpen);
        };
        if self.closed {
            return WindowResult::Error(SettleError::ChannelNotOpen);
        }

        match self.api.tick_channel(&channel_id).await {
            Ok(Gated::Granted(receipt)) => self.on_tick(receipt),
            Ok(Gated::PaymentRequired(required)) => WindowResult::PaymentRequired(required),
            Err(e) => WindowResult::Error(e),
        }
    }

    async fn close(&mut self) -> SettleResult<Option<ChannelSummary>> {
        if self.closed {
            return Ok(None);
        }
        self.closed = true;

        let Some(channel_id) = self.channel_id.clone() else {
            return Ok(None);
        };

        let receipt = self.api.close_channel(&channel_id).await?;
        Ok(Some(ChannelSummary {
            channel_id,
            total_seconds_streamed: receipt.channel.total_seconds_streamed,
            total_amount_owed: receipt.channel.total_amount_owed,
            total_amount_settled: receipt.channel.total_amount_settled,
            settlement_tx_id: receipt.settlement_tx_id,
        }))
    }
}
