//! Integration tests for the x402 challenge adapter using MockBackend.

use std::sync::Arc;

use tollstream_settle::{
    ChallengeAdapter, PaymentResolution, SettleError, WindowAuthorizer, WindowResult,
};
use tollstream_test_utils::{test_content, MockBackend};
use tollstream_types::{ContentId, ErrorKind, SettlementModel, WINDOW_SECONDS};
use tollstream_x402::PaymentSignature;

fn adapter(backend: &MockBackend) -> ChallengeAdapter<MockBackend> {
    ChallengeAdapter::new(Arc::new(backend.clone()), ContentId::new("c-1"))
}

#[tokio::test]
async fn test_request_without_credit_is_payment_required() {
    let backend = MockBackend::new().with_content(test_content("c-1", 50));
    let mut adapter = adapter(&backend);
    assert_eq!(adapter.model(), SettlementModel::X402);
    adapter.open().await.unwrap();

    match adapter.request_window().await {
        WindowResult::PaymentRequired(required) => {
            let req = required.primary().unwrap();
            assert_eq!(req.amount, "500");
            assert_eq!(req.asset, "USDC");
            assert_eq!(req.network, "arc-testnet");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_auto_pay_then_one_window() {
    let backend = MockBackend::new().with_content(test_content("c-1", 50));
    let mut adapter = adapter(&backend);

    assert!(matches!(
        adapter.request_window().await,
        WindowResult::PaymentRequired(_)
    ));

    adapter.resolve_payment(PaymentResolution::Auto).await.unwrap();
    assert_eq!(backend.credit_seconds(), WINDOW_SECONDS);

    match adapter.request_window().await {
        WindowResult::Granted(grant) => {
            assert_eq!(grant.seconds, WINDOW_SECONDS);
            assert_eq!(
                grant.playback_reference.as_deref(),
                Some("https://cdn.test/c-1.m3u8")
            );
            let note = grant.settlement.unwrap();
            assert_eq!(note.amount, Some(500));
        }
        other => panic!("unexpected {:?}", other),
    }

    // Credit is spent; the next window needs another payment
    assert!(matches!(
        adapter.request_window().await,
        WindowResult::PaymentRequired(_)
    ));
    assert_eq!(backend.calls().pay, 1);
}

#[tokio::test]
async fn test_signature_sent_exactly_once() {
    let backend = MockBackend::new();
    let mut adapter = adapter(&backend);

    adapter
        .resolve_payment(PaymentResolution::Signature(PaymentSignature::from_header(
            "sig-1",
        )))
        .await
        .unwrap();
    assert!(adapter.has_pending_signature());

    match adapter.request_window().await {
        WindowResult::Granted(grant) => assert!(grant.settlement.is_some()),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!adapter.has_pending_signature());

    // Next request goes out unsigned
    assert!(matches!(
        adapter.request_window().await,
        WindowResult::PaymentRequired(_)
    ));
    assert_eq!(backend.signatures_seen(), vec!["sig-1".to_string()]);
}

#[tokio::test]
async fn test_second_pending_signature_is_rejected() {
    let backend = MockBackend::new();
    let mut adapter = adapter(&backend);

    adapter
        .resolve_payment(PaymentResolution::Signature(PaymentSignature::from_header("a")))
        .await
        .unwrap();
    let err = adapter
        .resolve_payment(PaymentResolution::Signature(PaymentSignature::from_header("b")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[tokio::test]
async fn test_rejected_signature_is_not_resent() {
    let backend = MockBackend::new().rejecting_signatures();
    let mut adapter = adapter(&backend);

    adapter
        .resolve_payment(PaymentResolution::Signature(PaymentSignature::from_header("s")))
        .await
        .unwrap();
    assert!(matches!(
        adapter.request_window().await,
        WindowResult::PaymentRequired(_)
    ));
    assert!(matches!(
        adapter.request_window().await,
        WindowResult::PaymentRequired(_)
    ));
    assert_eq!(backend.signatures_seen().len(), 1);
}

#[tokio::test]
async fn test_prepaid_credit_grants_without_payment() {
    let backend = MockBackend::new().with_credit(20);
    let mut adapter = adapter(&backend);

    for _ in 0..2 {
        match adapter.request_window().await {
            WindowResult::Granted(grant) => assert!(grant.settlement.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }
    assert_eq!(backend.credit_seconds(), 0);
}

#[tokio::test]
async fn test_auto_pay_failure_propagates() {
    let backend = MockBackend::new().with_failing_pay();
    let mut adapter = adapter(&backend);

    let err = adapter
        .resolve_payment(PaymentResolution::Auto)
        .await
        .unwrap_err();
    assert!(matches!(err, SettleError::Server { status: 400, .. }));
}

#[tokio::test]
async fn test_close_is_noop() {
    let backend = MockBackend::new();
    let mut adapter = adapter(&backend);
    assert!(adapter.close().await.unwrap().is_none());
    assert_eq!(backend.calls(), Default::default());
}
