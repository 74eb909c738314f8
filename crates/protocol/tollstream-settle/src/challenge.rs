//! Challenge-response (x402) settlement.
//!
//! Each window is one `stream` call. When the backend answers 402, the
//! caller resolves the requirement either by letting the backend pay
//! (`Auto`) or by handing over a signature that rides on the next
//! request and is then gone.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use tollstream_types::{Amount, ContentId, SettlementModel, WINDOW_SECONDS};
use tollstream_x402::{PaymentReceipt, PaymentSignature};

use crate::api::{Gated, StreamApi};
use crate::authorizer::{
    ChannelSummary, PaymentResolution, SettlementNote, WindowAuthorizer, WindowGrant, WindowResult,
};
use crate::error::{SettleError, SettleResult};

/// [`WindowAuthorizer`] over the pay-per-chunk stream endpoint.
pub struct ChallengeAdapter<A> {
    api: Arc<A>,
    content_id: ContentId,
    pending_signature: Option<PaymentSignature>,
    pending_receipt: Option<PaymentReceipt>,
    last_required_amount: Option<Amount>,
}

impl<A: StreamApi> ChallengeAdapter<A> {
    /// Create an adapter for one content item.
    pub fn new(api: Arc<A>, content_id: ContentId) -> Self {
        Self {
            api,
            content_id,
            pending_signature: None,
            pending_receipt: None,
            last_required_amount: None,
        }
    }

    /// Whether a signature is waiting to be sent.
    pub fn has_pending_signature(&self) -> bool {
        self.pending_signature.is_some()
    }

    fn settlement_note(&mut self, receipt: Option<PaymentReceipt>) -> Option<SettlementNote> {
        let receipt = receipt.or_else(|| self.pending_receipt.take())?;
        Some(SettlementNote {
            transaction: receipt.transaction,
            amount: self.last_required_amount.take(),
        })
    }
}

#[async_trait]
impl<A: StreamApi + 'static> WindowAuthorizer for ChallengeAdapter<A> {
    fn model(&self) -> SettlementModel {
        SettlementModel::X402
    }

    async fn open(&mut self) -> SettleResult<()> {
        Ok(())
    }

    async fn request_window(&mut self) -> WindowResult {
        let signature = self.pending_signature.take();
        debug!(content_id = %self.content_id, signed = signature.is_some(), "Requesting window");

        match self.api.stream(&self.content_id, signature).await {
            Ok(Gated::Granted(grant)) => {
                let settlement = self.settlement_note(grant.receipt);
                WindowResult::Granted(WindowGrant {
                    seconds: WINDOW_SECONDS,
                    playback_reference: grant.playback_url,
                    settlement,
                })
            }
            Ok(Gated::PaymentRequired(required)) => {
                self.last_required_amount = match required.primary() {
                    Ok(requirement) => requirement.amount_minor().ok(),
                    Err(e) => {
                        warn!(error = %e, "402 without an acceptable requirement");
                        None
                    }
                };
                WindowResult::PaymentRequired(required)
            }
            Err(e) => WindowResult::Error(e),
        }
    }

    async fn resolve_payment(&mut self, resolution: PaymentResolution) -> SettleResult<()> {
        match resolution {
            PaymentResolution::Auto => {
                let grant = self.api.pay(&self.content_id).await?;
                info!(
                    content_id = %self.content_id,
                    seconds_remaining = ?grant.seconds_remaining,
                    "Auto-pay credited one window"
                );
                if grant.receipt.is_some() {
                    self.pending_receipt = grant.receipt;
                }
                Ok(())
            }
            PaymentResolution::Signature(signature) => {
                if self.pending_signature.is_some() {
                    return Err(SettleError::protocol_violation(
                        "a payment signature is already pending",
                    ));
                }
                self.pending_signature = Some(signature);
                Ok(())
            }
        }
    }

    async fn close(&mut self) -> SettleResult<Option<ChannelSummary>> {
        self.pending_signature = None;
        Ok(None)
    }
}
