//! Wire compatibility tests for tollstream-types.
//!
//! The backend speaks snake_case JSON; these tests pin the names the
//! session and CLI crates depend on.

use tollstream_types::*;

#[test]
fn session_state_wire_names() {
    let states = [
        (SessionState::Idle, "\"idle\""),
        (SessionState::Requesting, "\"requesting\""),
        (SessionState::Authorized, "\"authorized\""),
        (SessionState::PaymentRequired, "\"payment_required\""),
        (SessionState::Stopping, "\"stopping\""),
        (SessionState::Closed, "\"closed\""),
        (SessionState::Failed, "\"failed\""),
    ];
    for (state, expected) in states {
        assert_eq!(serde_json::to_string(&state).unwrap(), expected);
    }
}

#[test]
fn settlement_model_wire_names() {
    assert_eq!(
        serde_json::to_string(&SettlementModel::Channel).unwrap(),
        "\"channel\""
    );
    let model: SettlementModel = serde_json::from_str("\"x402\"").unwrap();
    assert_eq!(model, SettlementModel::X402);
}

#[test]
fn content_id_is_transparent() {
    let id = ContentId::new("c-1");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"c-1\"");
}

#[test]
fn content_without_optional_fields() {
    let json = r#"{"id": "c-1", "price_per_second": 4}"#;
    let content: Content = serde_json::from_str(json).unwrap();
    assert_eq!(content.price_per_second_minor, 4);
    assert!(content.playback_reference.is_empty());
    assert_eq!(content.window_price(), Some(40));
    assert_eq!(content.window_count(), 0);
}
