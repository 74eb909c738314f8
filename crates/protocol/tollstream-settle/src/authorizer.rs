//! The window authorization capability shared by both settlement models.

use async_trait::async_trait;
use serde::Serialize;
use tollstream_types::{Amount, SettlementModel};
use tollstream_x402::{PaymentRequired, PaymentSignature};

use crate::error::{SettleError, SettleResult};

/// Outcome of one window authorization attempt.
///
/// Every attempt resolves to exactly one of these. Only `Granted` may
/// change accrued spend.
#[derive(Debug)]
pub enum WindowResult {
    /// The window was authorized and charged.
    Granted(WindowGrant),
    /// The backend refused the window until a payment is made.
    PaymentRequired(PaymentRequired),
    /// Anything else went wrong.
    Error(SettleError),
}

/// A successful window authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowGrant {
    /// Seconds of playback authorized. May be 0 when the backend debounced
    /// the request.
    pub seconds: u64,
    /// Playback location handed back by the backend, if any.
    pub playback_reference: Option<String>,
    /// On-chain settlement that happened alongside this grant.
    pub settlement: Option<SettlementNote>,
}

/// Settlement that happened as a side effect of a window request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementNote {
    /// Transaction identifier.
    pub transaction: String,
    /// Amount settled, when the backend reports it.
    pub amount: Option<Amount>,
}

/// How the caller wants a payment requirement resolved.
#[derive(Debug)]
pub enum PaymentResolution {
    /// Let the backend pay on the viewer's behalf.
    Auto,
    /// Present a signature obtained from a payment gateway.
    Signature(PaymentSignature),
}

/// Final state of a closed channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    /// Channel identifier.
    pub channel_id: String,
    /// Seconds metered over the channel's life.
    pub total_seconds_streamed: u64,
    /// Total owed.
    pub total_amount_owed: Amount,
    /// Total settled on-chain.
    pub total_amount_settled: Amount,
    /// Settlement transaction from the close, if one happened.
    pub settlement_tx_id: Option<String>,
}

/// Authorizes credit windows against one settlement model.
///
/// Implementations hold per-session state (the open channel, a pending
/// signature) and are driven by exactly one session controller, one call
/// at a time.
#[async_trait]
pub trait WindowAuthorizer: Send {
    /// Settlement model this authorizer speaks.
    fn model(&self) -> SettlementModel;

    /// Prepare server-side resources. Calling it again is a no-op.
    async fn open(&mut self) -> SettleResult<()>;

    /// Request the next window.
    async fn request_window(&mut self) -> WindowResult;

    /// Resolve the payment requirement returned by the last request, so
    /// the next request can succeed.
    async fn resolve_payment(&mut self, resolution: PaymentResolution) -> SettleResult<()> {
        let _ = resolution;
        Err(SettleError::UnsupportedResolution {
            model: self.model(),
        })
    }

    /// Release server-side resources. Only the first call does anything.
    async fn close(&mut self) -> SettleResult<Option<ChannelSummary>>;
}
