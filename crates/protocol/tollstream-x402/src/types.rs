//! x402 protocol types.
//!
//! Only the client side of the exchange is modelled: parsing the 402 body,
//! carrying a payment signature on the retry, and decoding the settlement
//! receipt the backend attaches to a successful response.

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{X402Error, X402Result};

/// x402 protocol version spoken by the backend.
pub const X402_VERSION: u32 = 2;

/// HTTP header carrying the payment signature (client → server).
pub const HEADER_PAYMENT_SIGNATURE: &str = "Payment-Signature";

/// HTTP header carrying the settlement receipt (server → client).
pub const HEADER_PAYMENT_RESPONSE: &str = "Payment-Response";

/// The only payment scheme the backend offers.
pub const SCHEME_EXACT: &str = "exact";

/// Network identifier used by the reference deployment.
pub const NETWORK_ARC_TESTNET: &str = "arc-testnet";

// =============================================================================
// Payment Required (402 body)
// =============================================================================

/// Body of a 402 response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// x402 protocol version.
    pub x402_version: u32,

    /// Optional human-readable reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The resource being paid for.
    #[serde(default, deserialize_with = "deserialize_resource")]
    pub resource: ResourceInfo,

    /// Payment requirements the client may satisfy (any one of them).
    #[serde(default)]
    pub accepts: Vec<PaymentRequirement>,
}

impl PaymentRequired {
    /// The first accepted requirement, which is what auto-pay satisfies.
    pub fn primary(&self) -> X402Result<&PaymentRequirement> {
        self.accepts.first().ok_or(X402Error::NoAcceptedRequirement)
    }

    /// Find the requirement for a given scheme and network.
    pub fn find(&self, scheme: &str, network: &str) -> Option<&PaymentRequirement> {
        self.accepts
            .iter()
            .find(|r| r.scheme == scheme && r.network == network)
    }
}

/// Information about the resource being paid for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// URL of the resource.
    #[serde(default)]
    pub url: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: String,

    /// MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Some backends send the resource as a bare URL string.
fn deserialize_resource<'de, D>(deserializer: D) -> Result<ResourceInfo, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Resource {
        Info(ResourceInfo),
        Url(String),
    }

    Ok(match Resource::deserialize(deserializer)? {
        Resource::Info(info) => info,
        Resource::Url(url) => ResourceInfo {
            url,
            ..Default::default()
        },
    })
}

/// A single accepted payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    /// Payment scheme (e.g., "exact").
    pub scheme: String,

    /// Network identifier (e.g., "arc-testnet").
    pub network: String,

    /// Amount in the asset's smallest unit, string-encoded to avoid
    /// precision loss.
    pub amount: String,

    /// Asset identifier (token address or symbol).
    pub asset: String,

    /// Address to pay to.
    pub pay_to: String,

    /// Maximum time in seconds a payment stays valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,

    /// Scheme-specific extra data (e.g., EIP-712 domain name and version).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl PaymentRequirement {
    /// Parse the string amount into minor units.
    pub fn amount_minor(&self) -> X402Result<u64> {
        self.amount
            .trim()
            .parse::<u64>()
            .map_err(|_| X402Error::InvalidAmount {
                amount: self.amount.clone(),
            })
    }
}

// =============================================================================
// Payment Signature (Client → Server)
// =============================================================================

/// A single-use proof of payment intent for one requirement.
///
/// Deliberately not `Clone`: sending it consumes it, so the same signature
/// can never authorize two windows.
pub struct PaymentSignature {
    header: String,
}

impl PaymentSignature {
    /// Wrap an already-encoded header value obtained from a payment gateway.
    pub fn from_header(header_value: impl Into<String>) -> Self {
        Self {
            header: header_value.into(),
        }
    }

    /// Build the unsigned payload the reference backend accepts: the chosen
    /// requirement wrapped as `{"accepted": ...}`, base64-encoded JSON.
    pub fn for_requirement(requirement: &PaymentRequirement) -> X402Result<Self> {
        #[derive(Serialize)]
        struct Payload<'a> {
            accepted: &'a PaymentRequirement,
        }

        let json = serde_json::to_vec(&Payload {
            accepted: requirement,
        })?;
        Ok(Self {
            header: base64::engine::general_purpose::STANDARD.encode(json),
        })
    }

    /// Consume the signature, yielding the header value to send.
    pub fn into_header(self) -> String {
        self.header
    }
}

impl std::fmt::Debug for PaymentSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentSignature")
            .field("len", &self.header.len())
            .finish()
    }
}

// =============================================================================
// Payment Response (Server → Client after settlement)
// =============================================================================

/// Settlement receipt carried in the `Payment-Response` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    /// Transaction identifier on the settlement network.
    pub transaction: String,

    /// Payer address.
    #[serde(default = "unknown_payer")]
    pub payer: String,
}

fn unknown_payer() -> String {
    "unknown".to_string()
}

impl PaymentReceipt {
    /// Decode a receipt from a base64-encoded header value.
    pub fn from_header(header_value: &str) -> X402Result<Self> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(header_value.trim())
            .map_err(|e| X402Error::MalformedHeader {
                header: HEADER_PAYMENT_RESPONSE,
                reason: format!("base64 decode error: {}", e),
            })?;
        serde_json::from_slice(&decoded).map_err(|e| X402Error::MalformedHeader {
            header: HEADER_PAYMENT_RESPONSE,
            reason: format!("JSON parse error: {}", e),
        })
    }

    /// Encode this receipt to a base64 string for the header.
    pub fn to_header(&self) -> X402Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }
}
