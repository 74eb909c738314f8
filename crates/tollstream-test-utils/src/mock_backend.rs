//! In-memory streaming backend for testing.
//!
//! Implements the channel, stream and catalog APIs the way the real
//! backend does: channels accumulate seconds and debt, the stream endpoint
//! spends prepaid credit or answers 402, and auto-pay adds one window of
//! credit. Tick outcomes can be scripted, and every call is counted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tollstream_settle::{
    ChannelApi, ChannelInfo, ContentApi, Gated, SettleError, SettleResult, StreamApi, StreamGrant,
    TickReceipt,
};
use tollstream_types::{Amount, Content, ContentId, WINDOW_SECONDS};
use tollstream_x402::{
    PaymentReceipt, PaymentRequired, PaymentRequirement, PaymentSignature, ResourceInfo,
    NETWORK_ARC_TESTNET, SCHEME_EXACT, X402_VERSION,
};

/// Scripted outcome of one channel tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickStep {
    /// Meter this many seconds.
    Grant(u64),
    /// Debounced tick: nothing metered, `tick_seconds = 0`.
    Debounce,
    /// Move the channel total backwards by this many seconds.
    Rewind(u64),
    /// Answer 402.
    PaymentRequired,
    /// Fail with a network error.
    NetworkError,
    /// Fail with an HTTP status.
    ServerError(u16),
}

/// Number of calls per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_content: u32,
    pub open: u32,
    pub tick: u32,
    pub close: u32,
    pub stream: u32,
    pub pay: u32,
}

struct MockBackendInner {
    /// Catalog: content_id -> content.
    contents: HashMap<String, Content>,
    /// Rate for content not in the catalog.
    default_rate: Amount,
    /// Channels by id.
    channels: HashMap<String, ChannelInfo>,
    /// Idempotency key -> channel id.
    channel_keys: HashMap<String, String>,
    /// Scripted tick outcomes; a full window is granted when empty.
    tick_script: VecDeque<TickStep>,
    /// Settle on-chain once outstanding debt reaches this.
    settle_threshold: Option<Amount>,
    /// Prepaid stream seconds.
    credit_seconds: u64,
    /// Whether presented signatures are accepted as payment.
    accept_signatures: bool,
    /// Delay added to every call.
    latency: Duration,
    /// Number of opens that fail before one succeeds.
    open_failures: u32,
    fail_close: bool,
    fail_pay: bool,
    calls: CallCounts,
    signatures_seen: Vec<String>,
    in_flight: u32,
    max_in_flight: u32,
    tx_counter: u64,
}

/// A mock implementation of the backend API traits.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state.
#[derive(Clone)]
pub struct MockBackend {
    inner: Arc<RwLock<MockBackendInner>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter when a call finishes.
struct InFlightGuard {
    inner: Arc<RwLock<MockBackendInner>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.in_flight -= 1;
        }
    }
}

impl MockBackend {
    /// Create a backend charging 5 minor units per second.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockBackendInner {
                contents: HashMap::new(),
                default_rate: 5,
                channels: HashMap::new(),
                channel_keys: HashMap::new(),
                tick_script: VecDeque::new(),
                settle_threshold: None,
                credit_seconds: 0,
                accept_signatures: true,
                latency: Duration::ZERO,
                open_failures: 0,
                fail_close: false,
                fail_pay: false,
                calls: CallCounts::default(),
                signatures_seen: Vec::new(),
                in_flight: 0,
                max_in_flight: 0,
                tx_counter: 0,
            })),
        }
    }

    /// Set the rate for content not in the catalog.
    pub fn with_rate(self, rate: Amount) -> Self {
        self.inner.write().unwrap().default_rate = rate;
        self
    }

    /// Add a catalog entry.
    pub fn with_content(self, content: Content) -> Self {
        self.inner
            .write()
            .unwrap()
            .contents
            .insert(content.id.to_string(), content);
        self
    }

    /// Script the next tick outcomes.
    pub fn with_ticks(self, steps: impl IntoIterator<Item = TickStep>) -> Self {
        self.push_ticks(steps);
        self
    }

    /// Add a delay to every call.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.write().unwrap().latency = latency;
        self
    }

    /// Start with prepaid stream credit.
    pub fn with_credit(self, seconds: u64) -> Self {
        self.inner.write().unwrap().credit_seconds = seconds;
        self
    }

    /// Settle channel debt on-chain whenever it reaches `threshold`.
    pub fn with_settle_threshold(self, threshold: Amount) -> Self {
        self.inner.write().unwrap().settle_threshold = Some(threshold);
        self
    }

    /// Reject presented payment signatures with another 402.
    pub fn rejecting_signatures(self) -> Self {
        self.inner.write().unwrap().accept_signatures = false;
        self
    }

    /// Fail the first `n` channel opens with a network error.
    pub fn with_open_failures(self, n: u32) -> Self {
        self.inner.write().unwrap().open_failures = n;
        self
    }

    /// Fail every channel close.
    pub fn with_failing_close(self) -> Self {
        self.inner.write().unwrap().fail_close = true;
        self
    }

    /// Fail every auto-pay.
    pub fn with_failing_pay(self) -> Self {
        self.inner.write().unwrap().fail_pay = true;
        self
    }

    /// Script more tick outcomes at runtime.
    pub fn push_ticks(&self, steps: impl IntoIterator<Item = TickStep>) {
        self.inner.write().unwrap().tick_script.extend(steps);
    }

    /// Add stream credit at runtime, as an out-of-band payment would.
    pub fn add_credit(&self, seconds: u64) {
        self.inner.write().unwrap().credit_seconds += seconds;
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    pub fn calls(&self) -> CallCounts {
        self.inner.read().unwrap().calls
    }

    /// Raw header values of every signature presented, in order.
    pub fn signatures_seen(&self) -> Vec<String> {
        self.inner.read().unwrap().signatures_seen.clone()
    }

    /// Highest number of calls that were ever in progress at once.
    pub fn max_concurrent_calls(&self) -> u32 {
        self.inner.read().unwrap().max_in_flight
    }

    pub fn credit_seconds(&self) -> u64 {
        self.inner.read().unwrap().credit_seconds
    }

    pub fn channel(&self, id: &str) -> Option<ChannelInfo> {
        self.inner.read().unwrap().channels.get(id).cloned()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.read().unwrap().channels.len()
    }

    /// The 402 body this backend sends for a content item.
    pub fn payment_required_for(&self, content_id: &ContentId) -> PaymentRequired {
        let inner = self.inner.read().unwrap();
        Self::payment_required(&inner, content_id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn begin_call(&self) -> InFlightGuard {
        let latency = {
            let mut inner = self.inner.write().unwrap();
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.latency
        };
        let guard = InFlightGuard {
            inner: Arc::clone(&self.inner),
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        guard
    }

    fn rate_for(inner: &MockBackendInner, content_id: &str) -> Amount {
        inner
            .contents
            .get(content_id)
            .map(|c| c.price_per_second_minor)
            .unwrap_or(inner.default_rate)
    }

    fn next_tx_id(inner: &mut MockBackendInner) -> String {
        inner.tx_counter += 1;
        format!("simulated:{}", inner.tx_counter)
    }

    fn payment_required(inner: &MockBackendInner, content_id: &ContentId) -> PaymentRequired {
        let rate = Self::rate_for(inner, content_id.as_str());
        let title = inner
            .contents
            .get(content_id.as_str())
            .map(|c| c.title.clone())
            .unwrap_or_else(|| content_id.to_string());
        PaymentRequired {
            x402_version: X402_VERSION,
            error: Some("Payment required".to_string()),
            resource: ResourceInfo {
                url: format!("/content/{}/stream", content_id),
                description: format!("Stream {} ({}s)", title, WINDOW_SECONDS),
                mime_type: Some("application/json".to_string()),
            },
            accepts: vec![PaymentRequirement {
                scheme: SCHEME_EXACT.to_string(),
                network: NETWORK_ARC_TESTNET.to_string(),
                amount: (rate * WINDOW_SECONDS).to_string(),
                asset: "USDC".to_string(),
                pay_to: "0xcreator".to_string(),
                max_timeout_seconds: Some(60),
                extra: None,
            }],
        }
    }

    fn maybe_settle(inner: &mut MockBackendInner, channel_id: &str, receipt: &mut TickReceipt) {
        let Some(threshold) = inner.settle_threshold else {
            return;
        };
        let outstanding = receipt.channel.outstanding();
        if outstanding == 0 || outstanding < threshold {
            return;
        }
        let tx = Self::next_tx_id(inner);
        if let Some(channel) = inner.channels.get_mut(channel_id) {
            channel.total_amount_settled = channel.total_amount_owed;
            receipt.channel = channel.clone();
        }
        receipt.did_settle = true;
        receipt.settlement_tx_id = Some(tx);
        receipt.settlement_amount = Some(outstanding);
    }
}

#[async_trait]
impl ContentApi for MockBackend {
    async fn get_content(&self, id: &ContentId) -> SettleResult<Content> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.get_content += 1;
        inner
            .contents
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| SettleError::server(404, "Content not found"))
    }
}

#[async_trait]
impl ChannelApi for MockBackend {
    async fn open_channel(
        &self,
        content_id: &ContentId,
        idempotency_key: &str,
    ) -> SettleResult<ChannelInfo> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.open += 1;

        if inner.open_failures > 0 {
            inner.open_failures -= 1;
            return Err(SettleError::network("mock: connection reset"));
        }

        if let Some(id) = inner.channel_keys.get(idempotency_key) {
            if let Some(channel) = inner.channels.get(id) {
                return Ok(channel.clone());
            }
        }

        let id = format!("ch-{}", inner.channels.len() + 1);
        let channel = ChannelInfo {
            id: id.clone(),
            content_id: content_id.to_string(),
            status: "open".to_string(),
            locked_rate_minor: Self::rate_for(&inner, content_id.as_str()),
            usdc_address: Some("0xusdc".to_string()),
            ..Default::default()
        };
        inner.channels.insert(id.clone(), channel.clone());
        inner.channel_keys.insert(idempotency_key.to_string(), id);
        Ok(channel)
    }

    async fn tick_channel(&self, channel_id: &str) -> SettleResult<Gated<TickReceipt>> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.tick += 1;

        let step = inner
            .tick_script
            .pop_front()
            .unwrap_or(TickStep::Grant(WINDOW_SECONDS));

        let content_id = match inner.channels.get(channel_id) {
            Some(channel) if channel.status == "open" => ContentId::new(channel.content_id.clone()),
            Some(_) => return Err(SettleError::server(400, "Channel is closed")),
            None => return Err(SettleError::server(404, "Channel not found")),
        };

        let tick_seconds = match step {
            TickStep::PaymentRequired => {
                return Ok(Gated::PaymentRequired(Self::payment_required(&inner, &content_id)))
            }
            TickStep::NetworkError => return Err(SettleError::network("mock: connection reset")),
            TickStep::ServerError(status) => {
                return Err(SettleError::server(status, "mock: scripted failure"))
            }
            TickStep::Debounce => 0,
            TickStep::Grant(seconds) => seconds,
            TickStep::Rewind(seconds) => {
                if let Some(channel) = inner.channels.get_mut(channel_id) {
                    channel.total_seconds_streamed =
                        channel.total_seconds_streamed.saturating_sub(seconds);
                }
                0
            }
        };

        let channel = match inner.channels.get_mut(channel_id) {
            Some(channel) => channel,
            None => return Err(SettleError::server(404, "Channel not found")),
        };
        channel.total_seconds_streamed += tick_seconds;
        channel.total_amount_owed += tick_seconds * channel.locked_rate_minor;

        let mut receipt = TickReceipt {
            channel: channel.clone(),
            tick_seconds,
            ..Default::default()
        };
        Self::maybe_settle(&mut inner, channel_id, &mut receipt);
        Ok(Gated::Granted(receipt))
    }

    async fn close_channel(&self, channel_id: &str) -> SettleResult<TickReceipt> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.close += 1;

        if inner.fail_close {
            return Err(SettleError::network("mock: connection reset"));
        }

        let outstanding = match inner.channels.get_mut(channel_id) {
            Some(channel) => {
                channel.status = "closed".to_string();
                channel.outstanding()
            }
            None => return Err(SettleError::server(404, "Channel not found")),
        };

        let mut receipt = TickReceipt::default();
        if outstanding > 0 {
            let tx = Self::next_tx_id(&mut inner);
            receipt.did_settle = true;
            receipt.settlement_tx_id = Some(tx);
            receipt.settlement_amount = Some(outstanding);
        }
        if let Some(channel) = inner.channels.get_mut(channel_id) {
            channel.total_amount_settled = channel.total_amount_owed;
            receipt.channel = channel.clone();
        }
        Ok(receipt)
    }
}

#[async_trait]
impl StreamApi for MockBackend {
    async fn stream(
        &self,
        content_id: &ContentId,
        signature: Option<PaymentSignature>,
    ) -> SettleResult<Gated<StreamGrant>> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.stream += 1;

        let playback_url = inner
            .contents
            .get(content_id.as_str())
            .map(|c| c.playback_reference.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| format!("https://cdn.test/{}.m3u8", content_id));

        if let Some(signature) = signature {
            inner.signatures_seen.push(signature.into_header());
            if !inner.accept_signatures {
                return Ok(Gated::PaymentRequired(Self::payment_required(&inner, content_id)));
            }
            let tx = Self::next_tx_id(&mut inner);
            return Ok(Gated::Granted(StreamGrant {
                playback_url: Some(playback_url),
                seconds_remaining: Some(inner.credit_seconds),
                receipt: Some(PaymentReceipt {
                    transaction: tx,
                    payer: "0xviewer".to_string(),
                }),
            }));
        }

        if inner.credit_seconds >= WINDOW_SECONDS {
            inner.credit_seconds -= WINDOW_SECONDS;
            return Ok(Gated::Granted(StreamGrant {
                playback_url: Some(playback_url),
                seconds_remaining: Some(inner.credit_seconds),
                receipt: None,
            }));
        }

        Ok(Gated::PaymentRequired(Self::payment_required(&inner, content_id)))
    }

    async fn pay(&self, content_id: &ContentId) -> SettleResult<StreamGrant> {
        let _call = self.begin_call().await;
        let mut inner = self.inner.write().unwrap();
        inner.calls.pay += 1;

        if inner.fail_pay {
            return Err(SettleError::server(400, "Insufficient balance"));
        }

        inner.credit_seconds += WINDOW_SECONDS;
        let tx = Self::next_tx_id(&mut inner);
        Ok(StreamGrant {
            playback_url: Some(format!("https://cdn.test/{}.m3u8", content_id)),
            seconds_remaining: Some(inner.credit_seconds),
            receipt: Some(PaymentReceipt {
                transaction: tx,
                payer: "0xviewer".to_string(),
            }),
        })
    }
}
