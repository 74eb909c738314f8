//! Wire-level tests for HttpBackend against a canned-response server.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use tollstream_settle::{
    BackendConfig, ChannelApi, ContentApi, Gated, HttpBackend, SettleError, StreamApi,
};
use tollstream_test_utils::usdc_payment_required;
use tollstream_types::{ContentId, ErrorKind};
use tollstream_x402::{PaymentReceipt, PaymentSignature};

const TOKEN: &str = "tok-123";

/// One request as the server saw it.
#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    target: String,
    /// Header names lowercased.
    headers: Vec<(String, String)>,
    body: String,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn header_count(&self, name: &str) -> usize {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .count()
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Response written back for one connection.
struct Canned {
    status: u16,
    headers: Vec<(&'static str, String)>,
    body: String,
}

impl Canned {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "application/json".to_string())],
            body: body.to_string(),
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", "text/plain".to_string())],
            body: body.to_string(),
        }
    }

    fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// Serves each canned response on its own connection, in order.
struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl TestServer {
    async fn start(responses: Vec<Canned>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            for canned in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                write_response(&mut socket, canned).await;
            }
        });

        Self {
            base_url: format!("http://{}/api/v1", addr),
            requests,
        }
    }

    fn backend(&self) -> HttpBackend {
        HttpBackend::new(&BackendConfig::new(&self.base_url, TOKEN)).unwrap()
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(socket: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next().unwrap().split(' ');
    let method = request_line.next().unwrap().to_string();
    let target = request_line.next().unwrap().to_string();

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .map(|(_, value)| value.parse::<usize>().unwrap())
        .unwrap_or(0);

    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        body.extend_from_slice(&chunk[..n]);
    }

    RecordedRequest {
        method,
        target,
        headers,
        body: String::from_utf8(body).unwrap(),
    }
}

async fn write_response(socket: &mut TcpStream, canned: Canned) {
    let mut out = format!("HTTP/1.1 {} Canned\r\n", canned.status);
    for (name, value) in &canned.headers {
        out.push_str(&format!("{}: {}\r\n", name, value));
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        canned.body.len(),
        canned.body
    ));
    socket.write_all(out.as_bytes()).await.unwrap();
    let _ = socket.shutdown().await;
}

fn channel_json(seconds: u64) -> serde_json::Value {
    json!({
        "id": "ch-1",
        "content_id": "c-1",
        "status": "open",
        "price_per_second_locked": 5,
        "total_seconds_streamed": seconds,
        "total_amount_owed": seconds * 5,
        "total_amount_settled": 0,
    })
}

fn payment_required_json() -> serde_json::Value {
    serde_json::to_value(usdc_payment_required("500")).unwrap()
}

fn receipt() -> PaymentReceipt {
    PaymentReceipt {
        transaction: "0xabc".to_string(),
        payer: "0xviewer".to_string(),
    }
}

// =============================================================================
// Content
// =============================================================================

#[tokio::test]
async fn test_get_content_uses_bearer() {
    let server = TestServer::start(vec![Canned::json(
        200,
        json!({
            "id": "c-1",
            "title": "Clip",
            "price_per_second": 5,
            "playback_url": "https://cdn.test/c-1.m3u8",
            "duration_seconds": 120,
        }),
    )])
    .await;

    let item = server
        .backend()
        .get_content(&ContentId::new("c-1"))
        .await
        .unwrap();

    assert_eq!(item.price_per_second_minor, 5);
    assert_eq!(item.duration_seconds, 120);

    let requests = server.requests();
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].target, "/api/v1/content/c-1");
    assert_eq!(
        requests[0].header("authorization"),
        Some(format!("Bearer {}", TOKEN).as_str())
    );
}

#[tokio::test]
async fn test_error_detail_becomes_server_error() {
    let server =
        TestServer::start(vec![Canned::json(404, json!({ "detail": "Content not found" }))]).await;

    let err = server
        .backend()
        .get_content(&ContentId::new("missing"))
        .await
        .unwrap_err();

    match err {
        SettleError::Server { status, message } => {
            assert_eq!(status, 404);
            assert_eq!(message, "Content not found");
        }
        other => panic!("expected server error, got {:?}", other),
    }
}

// =============================================================================
// Channel
// =============================================================================

#[tokio::test]
async fn test_open_sends_idempotency_key() {
    let server = TestServer::start(vec![Canned::json(200, channel_json(0))]).await;

    let channel = server
        .backend()
        .open_channel(&ContentId::new("c-1"), "c-1:viewer-1")
        .await
        .unwrap();
    assert_eq!(channel.id, "ch-1");
    assert_eq!(channel.locked_rate_minor, 5);

    let requests = server.requests();
    let open = &requests[0];
    assert_eq!(open.method, "POST");
    assert_eq!(open.target, "/api/v1/payments/channel/open");
    assert_eq!(open.header("idempotency-key"), Some("c-1:viewer-1"));
    assert_eq!(
        open.header("authorization"),
        Some(format!("Bearer {}", TOKEN).as_str())
    );
    assert_eq!(open.json()["content_id"], "c-1");
}

#[tokio::test]
async fn test_tick_grant_and_payment_required() {
    let mut tick = channel_json(10);
    tick["tick_seconds"] = json!(10);
    let server = TestServer::start(vec![
        Canned::json(200, tick),
        Canned::json(402, payment_required_json()),
    ])
    .await;
    let backend = server.backend();

    match backend.tick_channel("ch-1").await.unwrap() {
        Gated::Granted(receipt) => {
            assert_eq!(receipt.tick_seconds, 10);
            assert_eq!(receipt.channel.total_seconds_streamed, 10);
        }
        other => panic!("expected grant, got {:?}", other),
    }

    match backend.tick_channel("ch-1").await.unwrap() {
        Gated::PaymentRequired(required) => {
            assert_eq!(required.primary().unwrap().amount, "500");
        }
        other => panic!("expected payment required, got {:?}", other),
    }

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.target, "/api/v1/payments/channel/tick");
        assert_eq!(request.json()["channel_id"], "ch-1");
        assert!(request.header("idempotency-key").is_none());
        assert!(request.header("authorization").is_some());
    }
}

// =============================================================================
// Stream and pay
// =============================================================================

#[tokio::test]
async fn test_signed_stream_sends_signature_once_and_reads_receipt() {
    let server = TestServer::start(vec![
        Canned::json(
            200,
            json!({ "playback_url": "https://cdn.test/c-1.m3u8", "seconds_remaining": 10 }),
        )
        .with_header("Payment-Response", receipt().to_header().unwrap()),
        Canned::json(402, payment_required_json()),
    ])
    .await;
    let backend = server.backend();
    let id = ContentId::new("c-1");

    let grant = match backend
        .stream(&id, Some(PaymentSignature::from_header("sig-1")))
        .await
        .unwrap()
    {
        Gated::Granted(grant) => grant,
        other => panic!("expected grant, got {:?}", other),
    };
    assert_eq!(grant.playback_url.as_deref(), Some("https://cdn.test/c-1.m3u8"));
    assert_eq!(grant.seconds_remaining, Some(10));
    assert_eq!(grant.receipt, Some(receipt()));

    // Without a signature the server asks again
    assert!(matches!(
        backend.stream(&id, None).await.unwrap(),
        Gated::PaymentRequired(_)
    ));

    let requests = server.requests();
    let signed = &requests[0];
    assert_eq!(signed.method, "GET");
    assert_eq!(
        signed.target,
        format!("/api/v1/content/c-1/stream?access_token={}", TOKEN)
    );
    assert_eq!(signed.header_count("payment-signature"), 1);
    assert_eq!(signed.header("payment-signature"), Some("sig-1"));
    assert!(signed.header("authorization").is_none());

    let unsigned = &requests[1];
    assert_eq!(unsigned.header_count("payment-signature"), 0);
}

#[tokio::test]
async fn test_unparseable_payment_required_is_terminal() {
    let server = TestServer::start(vec![Canned::text(402, "pay up")]).await;

    let err = server
        .backend()
        .stream(&ContentId::new("c-1"), None)
        .await
        .unwrap_err();

    assert!(matches!(err, SettleError::Server { status: 402, .. }));
    assert_eq!(err.kind(), ErrorKind::Terminal);
}

#[tokio::test]
async fn test_pay_uses_query_token_and_reads_receipt() {
    let server = TestServer::start(vec![Canned::json(
        200,
        json!({ "playback_url": "https://cdn.test/c-1.m3u8" }),
    )
    .with_header("Payment-Response", receipt().to_header().unwrap())])
    .await;

    let grant = server
        .backend()
        .pay(&ContentId::new("c-1"))
        .await
        .unwrap();
    assert_eq!(grant.receipt, Some(receipt()));
    assert_eq!(grant.seconds_remaining, None);

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(
        requests[0].target,
        format!("/api/v1/content/c-1/pay?access_token={}", TOKEN)
    );
    assert!(requests[0].header("authorization").is_none());
    assert_eq!(requests[0].header_count("payment-signature"), 0);
}

#[tokio::test]
async fn test_undecodable_receipt_does_not_fail_grant() {
    let server = TestServer::start(vec![Canned::json(
        200,
        json!({ "playback_url": "https://cdn.test/c-1.m3u8" }),
    )
    .with_header("Payment-Response", "%%%".to_string())])
    .await;

    let grant = server
        .backend()
        .pay(&ContentId::new("c-1"))
        .await
        .unwrap();
    assert!(grant.receipt.is_none());
    assert!(grant.playback_url.is_some());
}
