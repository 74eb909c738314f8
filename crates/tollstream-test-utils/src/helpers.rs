//! Helper functions for creating test fixtures.
//!
//! Provides catalog entries, 402 bodies and fully wired sessions over a
//! [`MockBackend`].

use std::sync::Arc;
use std::time::Duration;

use tollstream_session::{
    SessionConfig, SessionController, SessionEvent, SessionEvents, SessionHandle,
};
use tollstream_settle::{ChallengeAdapter, ChannelTickAdapter, RetryPolicy, WindowAuthorizer};
use tollstream_types::{Amount, Content, ContentId, SessionState};
use tollstream_x402::{
    PaymentRequired, PaymentRequirement, ResourceInfo, NETWORK_ARC_TESTNET, SCHEME_EXACT,
    X402_VERSION,
};

use crate::{MockBackend, RecordingGate};

/// Viewer id used by test sessions.
pub const TEST_VIEWER: &str = "viewer-1";

/// A catalog entry with the given rate.
pub fn test_content(id: &str, rate: Amount) -> Content {
    Content {
        id: ContentId::new(id),
        title: format!("Test {}", id),
        price_per_second_minor: rate,
        playback_reference: format!("https://cdn.test/{}.m3u8", id),
        duration_seconds: 120,
    }
}

/// A 402 body asking for `amount` USDC on the Arc testnet.
pub fn usdc_payment_required(amount: &str) -> PaymentRequired {
    PaymentRequired {
        x402_version: X402_VERSION,
        error: Some("Payment required".to_string()),
        resource: ResourceInfo {
            url: "/content/c-1/stream".to_string(),
            description: "Stream (10s)".to_string(),
            mime_type: None,
        },
        accepts: vec![PaymentRequirement {
            scheme: SCHEME_EXACT.to_string(),
            network: NETWORK_ARC_TESTNET.to_string(),
            amount: amount.to_string(),
            asset: "USDC".to_string(),
            pay_to: "0xcreator".to_string(),
            max_timeout_seconds: Some(60),
            extra: None,
        }],
    }
}

/// A spawned session plus the handles a test needs to inspect it.
pub struct TestSession {
    pub handle: SessionHandle,
    pub events: SessionEvents,
    pub gate: RecordingGate,
}

impl TestSession {
    /// Every event received so far, without waiting.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Wait (in virtual time, up to a minute) until the session reaches
    /// `state`. Panics on timeout.
    pub async fn wait_for_state(&self, state: SessionState) {
        let mut rx = self.handle.subscribe();
        let reached = tokio::time::timeout(Duration::from_secs(60), async {
            rx.wait_for(|s| s.state == state).await.is_ok()
        })
        .await;
        assert!(
            matches!(reached, Ok(true)),
            "session never reached {} (now {})",
            state,
            self.handle.snapshot().state
        );
    }
}

/// Spawn a channel-model session over `backend`.
pub fn channel_session(backend: &MockBackend, content_id: &str, rate: Amount) -> TestSession {
    let adapter = ChannelTickAdapter::new(
        Arc::new(backend.clone()),
        ContentId::new(content_id),
        TEST_VIEWER,
    )
    .with_retry(RetryPolicy::once());
    spawn(Box::new(adapter), content_id, rate)
}

/// Spawn a challenge-model session over `backend`.
pub fn challenge_session(backend: &MockBackend, content_id: &str, rate: Amount) -> TestSession {
    let adapter = ChallengeAdapter::new(Arc::new(backend.clone()), ContentId::new(content_id));
    spawn(Box::new(adapter), content_id, rate)
}

fn spawn(
    authorizer: Box<dyn WindowAuthorizer>,
    content_id: &str,
    rate: Amount,
) -> TestSession {
    let gate = RecordingGate::new();
    let config = SessionConfig::new(ContentId::new(content_id), rate);
    let (handle, events) = SessionController::spawn(config, authorizer, Box::new(gate.clone()));
    TestSession {
        handle,
        events,
        gate,
    }
}

/// Accrued totals reported by the spend-delta events, in order.
pub fn accrued_totals(events: &[SessionEvent]) -> Vec<Amount> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::SpendDelta { accrued_minor, .. } => Some(*accrued_minor),
            _ => None,
        })
        .collect()
}

/// Number of error events.
pub fn error_count(events: &[SessionEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, SessionEvent::Error { .. }))
        .count()
}
