//! Session states and settlement model selection.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// State of a metered streaming session.
///
/// ```text
/// Idle ─start─► Requesting ─granted─► Authorized ─clock─► Requesting ...
///                   │  │
///                   │  └─402─► PaymentRequired ─resolve─► Requesting
///                   └─error─► Failed ─resume─► Requesting
/// any ─stop─► Stopping ─► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No window request outstanding; clock stopped.
    #[default]
    Idle,
    /// A window authorization call is in flight.
    Requesting,
    /// The last window was granted; playback may continue.
    Authorized,
    /// The last window was refused with a payment requirement.
    PaymentRequired,
    /// Teardown in progress.
    Stopping,
    /// Terminal.
    Closed,
    /// An unexpected error stopped metering.
    Failed,
}

impl SessionState {
    /// Get the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Authorized => "authorized",
            Self::PaymentRequired => "payment_required",
            Self::Stopping => "stopping",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether the session has been started and not yet torn down.
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            Self::Requesting | Self::Authorized | Self::PaymentRequired | Self::Failed
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend settlement model used to authorize windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettlementModel {
    /// Open/tick/close payment channel.
    #[default]
    Channel,
    /// x402 challenge-response, one payment per window.
    X402,
}

impl SettlementModel {
    /// Get the model name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::X402 => "x402",
        }
    }
}

impl std::fmt::Display for SettlementModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SettlementModel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "channel" => Ok(Self::Channel),
            "x402" | "challenge" => Ok(Self::X402),
            other => Err(ParseError::UnknownSettlementModel(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::PaymentRequired.as_str(), "payment_required");
        assert_eq!(SessionState::default(), SessionState::Idle);
        let json = serde_json::to_string(&SessionState::PaymentRequired).unwrap();
        assert_eq!(json, "\"payment_required\"");
    }

    #[test]
    fn test_state_predicates() {
        assert!(SessionState::Closed.is_terminal());
        assert!(!SessionState::Failed.is_terminal());
        assert!(SessionState::Authorized.is_started());
        assert!(!SessionState::Idle.is_started());
        assert!(!SessionState::Stopping.is_started());
    }

    #[test]
    fn test_settlement_model_parse() {
        assert_eq!("channel".parse::<SettlementModel>().unwrap(), SettlementModel::Channel);
        assert_eq!("X402".parse::<SettlementModel>().unwrap(), SettlementModel::X402);
        assert_eq!("challenge".parse::<SettlementModel>().unwrap(), SettlementModel::X402);
        assert!("invoice".parse::<SettlementModel>().is_err());
    }
}
