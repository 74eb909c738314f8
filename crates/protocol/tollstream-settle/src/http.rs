//! HTTP client for the streaming backend.
//!
//! Implements [`ContentApi`], [`ChannelApi`] and [`StreamApi`] over reqwest.
//! Channel and catalog calls authenticate with a bearer header; the stream
//! and pay endpoints take the token as an `access_token` query parameter
//! because media players cannot attach headers.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use tollstream_types::{Content, ContentId};
use tollstream_x402::{
    PaymentReceipt, PaymentRequired, PaymentSignature, HEADER_PAYMENT_RESPONSE,
    HEADER_PAYMENT_SIGNATURE,
};

use crate::api::{ChannelApi, ChannelInfo, ContentApi, Gated, StreamApi, StreamGrant, TickReceipt};
use crate::config::BackendConfig;
use crate::error::{SettleError, SettleResult};

/// Header the backend uses to deduplicate channel opens.
pub const HEADER_IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// reqwest-backed client for the streaming backend.
#[derive(Clone)]
pub struct HttpBackend {
    /// HTTP client
    client: Client,
    /// API base URL, without trailing slash
    base_url: Url,
    /// Bearer credential
    token: String,
}

impl HttpBackend {
    /// Create a new backend client.
    pub fn new(config: &BackendConfig) -> SettleResult<Self> {
        config.validate()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| SettleError::config(format!("invalid base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SettleError::config("base_url cannot be a base URL"));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SettleError::network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn post_channel(
        &self,
        action: &str,
        body: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> SettleResult<Response> {
        let url = self.endpoint(&["payments", "channel", action]);
        debug!(url = %url, action, "Channel request");

        let mut request = self.client.post(url).bearer_auth(&self.token).json(&body);
        if let Some(key) = idempotency_key {
            request = request.header(HEADER_IDEMPOTENCY_KEY, key);
        }
        Ok(request.send().await?)
    }
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Parse a 2xx body, or turn anything else into a [`SettleError::Server`].
async fn read_json<T: DeserializeOwned>(response: Response) -> SettleResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(server_error(status, response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| SettleError::malformed(e.to_string()))
}

/// Parse a 402 body. An unparseable body still counts as a refusal from
/// the server, but not one the client can act on.
async fn read_payment_required(response: Response) -> SettleResult<PaymentRequired> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, "Unparseable 402 body");
        SettleError::server(StatusCode::PAYMENT_REQUIRED.as_u16(), "Payment required")
    })
}

/// Build a server error from the body's `detail`, then `error`, then the
/// status text.
async fn server_error(status: StatusCode, response: Response) -> SettleError {
    let body = response.text().await.unwrap_or_default();
    SettleError::server(status.as_u16(), error_detail(status, &body))
}

fn error_detail(status: StatusCode, body: &str) -> String {
    let value: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let field = |name: &str| {
        value.as_ref().and_then(|v| v.get(name)).and_then(|d| match d {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    };
    field("detail")
        .or_else(|| field("error"))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string())
}

/// Decode the receipt header, if present. A bad receipt never fails the
/// grant it rides on.
fn receipt_header(response: &Response) -> Option<PaymentReceipt> {
    let value = response.headers().get(HEADER_PAYMENT_RESPONSE)?;
    let text = match value.to_str() {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Non-ASCII payment receipt header");
            return None;
        }
    };
    match PaymentReceipt::from_header(text) {
        Ok(receipt) => Some(receipt),
        Err(e) => {
            warn!(error = %e, "Ignoring undecodable payment receipt");
            None
        }
    }
}

async fn read_grant(response: Response) -> SettleResult<StreamGrant> {
    let receipt = receipt_header(&response);
    let mut grant: StreamGrant = read_json(response).await?;
    if let Some(receipt) = &receipt {
        info!(transaction = %receipt.transaction, payer = %receipt.payer, "Payment settled");
    }
    grant.receipt = receipt;
    Ok(grant)
}

#[async_trait]
impl ContentApi for HttpBackend {
    async fn get_content(&self, id: &ContentId) -> SettleResult<Content> {
        let url = self.endpoint(&["content", id.as_str()]);
        debug!(url = %url, "Fetching content");

        let response = self.client.get(url).bearer_auth(&self.token).send().await?;
        read_json(response).await
    }
}

#[async_trait]
impl ChannelApi for HttpBackend {
    async fn open_channel(
        &self,
        content_id: &ContentId,
        idempotency_key: &str,
    ) -> SettleResult<ChannelInfo> {
        let response = self
            .post_channel(
                "open",
                json!({ "content_id": content_id.as_str() }),
                Some(idempotency_key),
            )
            .await?;
        let channel: ChannelInfo = read_json(response).await?;
        info!(channel_id = %channel.id, content_id = %content_id, "Channel opened");
        Ok(channel)
    }

    async fn tick_channel(&self, channel_id: &str) -> SettleResult<Gated<TickReceipt>> {
        let response = self
            .post_channel("tick", json!({ "channel_id": channel_id }), None)
            .await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            return Ok(Gated::PaymentRequired(read_payment_required(response).await?));
        }
        let receipt: TickReceipt = read_json(response).await?;
        debug!(
            channel_id,
            tick_seconds = receipt.tick_seconds,
            total_seconds = receipt.channel.total_seconds_streamed,
            "Channel ticked"
        );
        Ok(Gated::Granted(receipt))
    }

    async fn close_channel(&self, channel_id: &str) -> SettleResult<TickReceipt> {
        let response = self
            .post_channel("close", json!({ "channel_id": channel_id }), None)
            .await?;
        let receipt: TickReceipt = read_json(response).await?;
        info!(
            channel_id,
            total_seconds = receipt.channel.total_seconds_streamed,
            total_owed = receipt.channel.total_amount_owed,
            "Channel closed"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl StreamApi for HttpBackend {
    async fn stream(
        &self,
        content_id: &ContentId,
        signature: Option<PaymentSignature>,
    ) -> SettleResult<Gated<StreamGrant>> {
        let url = self.endpoint(&["content", content_id.as_str(), "stream"]);
        debug!(url = %url, signed = signature.is_some(), "Requesting stream window");

        let mut request = self
            .client
            .get(url)
            .query(&[("access_token", self.token.as_str())]);
        if let Some(signature) = signature {
            request = request.header(HEADER_PAYMENT_SIGNATURE, signature.into_header());
        }

        let response = request.send().await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            return Ok(Gated::PaymentRequired(read_payment_required(response).await?));
        }
        Ok(Gated::Granted(read_grant(response).await?))
    }

    async fn pay(&self, content_id: &ContentId) -> SettleResult<StreamGrant> {
        let url = self.endpoint(&["content", content_id.as_str(), "pay"]);
        debug!(url = %url, "Auto-paying one window");

        let response = self
            .client
            .post(url)
            .query(&[("access_token", self.token.as_str())])
            .send()
            .await?;
        read_grant(response).await
    }
}
