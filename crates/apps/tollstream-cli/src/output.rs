//! Output formatting for CLI.

use colored::Colorize;
use serde::Serialize;
use tollstream_session::SessionEvent;
use tollstream_settle::{ChannelSummary, SettlementNote};
use tollstream_types::{Amount, SessionState, SettlementModel};

use crate::config::format_usdc;

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use 'human' or 'json'.", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Trait for renderable output.
pub trait Render {
    /// Render as human-readable string.
    fn render_human(&self) -> String;

    /// Render as JSON string.
    fn render_json(&self) -> String;

    /// Render in the specified format.
    fn render(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.render_human(),
            OutputFormat::Json => self.render_json(),
        }
    }
}

// =============================================================================
// Output Types
// =============================================================================

/// Output for config initialization.
#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub config_path: String,
    pub base_url: String,
    pub model: SettlementModel,
    pub overwritten: bool,
}

impl Render for InitOutput {
    fn render_human(&self) -> String {
        let verb = if self.overwritten {
            "Configuration replaced:"
        } else {
            "Configuration saved to:"
        };
        format!(
            "{} {}\n{} {}\n{} {}\n{} set TOLLSTREAM_TOKEN or edit api.token",
            verb.green().bold(),
            self.config_path,
            "Backend:".bold(),
            self.base_url,
            "Model:".bold(),
            self.model,
            "Next:".cyan(),
        )
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Output for content lookup.
#[derive(Debug, Serialize)]
pub struct ContentOutput {
    pub id: String,
    pub title: String,
    pub price_per_second_minor: Amount,
    pub window_price_minor: Option<Amount>,
    pub duration_seconds: u64,
    pub windows: u64,
    pub playback_url: String,
}

impl Render for ContentOutput {
    fn render_human(&self) -> String {
        let window_price = self
            .window_price_minor
            .map(format_usdc)
            .unwrap_or_else(|| "overflows".red().to_string());
        let mut lines = vec![
            format!("{} {}", "Content:".bold(), self.id),
            format!("{} \"{}\"", "Title:".bold(), self.title),
            format!(
                "{} {} / second",
                "Price:".bold(),
                format_usdc(self.price_per_second_minor)
            ),
            format!("{} {} / window", "Window:".bold(), window_price),
        ];
        if self.duration_seconds > 0 {
            lines.push(format!(
                "{} {}s ({} windows)",
                "Duration:".bold(),
                self.duration_seconds,
                self.windows
            ));
        }
        if !self.playback_url.is_empty() {
            lines.push(format!("{} {}", "Playback:".bold(), self.playback_url));
        }
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Why `watch` stopped the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The requested duration elapsed.
    Elapsed,
    /// Ctrl-C or SIGTERM.
    Interrupted,
    /// The spend cap was reached.
    BudgetReached,
    /// A payment was required and not made.
    PaymentDeclined,
    /// The session reported an error.
    Failed,
    /// The session closed on its own.
    Closed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Elapsed => "duration elapsed",
            Self::Interrupted => "interrupted",
            Self::BudgetReached => "spend cap reached",
            Self::PaymentDeclined => "payment declined",
            Self::Failed => "session failed",
            Self::Closed => "session closed",
        };
        f.write_str(s)
    }
}

/// Output for a finished `watch`.
#[derive(Debug, Serialize)]
pub struct WatchOutput {
    pub content_id: String,
    pub model: SettlementModel,
    pub reason: StopReason,
    pub state: SessionState,
    pub accrued_minor: Amount,
    pub windows_granted: u64,
    pub elapsed_secs: u64,
    pub settlements: Vec<SettlementNote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Render for WatchOutput {
    fn render_human(&self) -> String {
        let header = match self.reason {
            StopReason::Failed => "Session failed:".red().bold(),
            StopReason::PaymentDeclined => "Session stopped:".yellow().bold(),
            _ => "Session ended:".green().bold(),
        };
        let mut lines = vec![
            format!("{} {} ({})", header, self.content_id, self.reason),
            format!("{} {}", "Model:".bold(), self.model),
            format!("{} {}", "State:".bold(), self.state),
            format!(
                "{} {} in {} windows over {}s",
                "Spent:".bold(),
                format_usdc(self.accrued_minor),
                self.windows_granted,
                self.elapsed_secs
            ),
        ];
        if let Some(channel) = &self.channel {
            lines.push(format!(
                "{} {} streamed {}s, owed {}, settled {}",
                "Channel:".bold(),
                channel.channel_id,
                channel.total_seconds_streamed,
                format_usdc(channel.total_amount_owed),
                format_usdc(channel.total_amount_settled)
            ));
        }
        if !self.settlements.is_empty() {
            lines.push(format!("{}", "Settlements:".bold()));
            for note in &self.settlements {
                let amount = note
                    .amount
                    .map(format_usdc)
                    .unwrap_or_else(|| "unknown amount".to_string());
                lines.push(format!("  {} ({})", note.transaction, amount));
            }
        }
        if let Some(error) = &self.last_error {
            lines.push(format!("{} {}", "Error:".red(), error));
        }
        lines.join("\n")
    }

    fn render_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// One-line description of a session event.
pub fn describe_event(event: &SessionEvent) -> String {
    match event {
        SessionEvent::StateChanged { from, to } => format!("{} -> {}", from, to),
        SessionEvent::SpendDelta {
            delta_minor,
            accrued_minor,
            seconds,
        } => format!(
            "+{} for {}s (total {})",
            format_usdc(*delta_minor),
            seconds,
            format_usdc(*accrued_minor)
        ),
        SessionEvent::PaymentRequired { requirement } => match requirement.primary() {
            Ok(req) => format!(
                "payment required: {} {} on {}",
                req.amount, req.asset, req.network
            ),
            Err(_) => "payment required".to_string(),
        },
        SessionEvent::Error { kind, message } => format!("{} error: {}", kind, message),
        SessionEvent::Settled {
            transaction,
            amount,
        } => match amount {
            Some(amount) => format!("settled {} in {}", format_usdc(*amount), transaction),
            None => format!("settled in {}", transaction),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> WatchOutput {
        WatchOutput {
            content_id: "c-1".to_string(),
            model: SettlementModel::Channel,
            reason: StopReason::Elapsed,
            state: SessionState::Closed,
            accrued_minor: 150,
            windows_granted: 3,
            elapsed_secs: 30,
            settlements: vec![SettlementNote {
                transaction: "tx-1".to_string(),
                amount: Some(150),
            }],
            channel: None,
            last_error: None,
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_watch_output_json() {
        let json: serde_json::Value =
            serde_json::from_str(&summary().render(OutputFormat::Json)).unwrap();
        assert_eq!(json["reason"], "elapsed");
        assert_eq!(json["state"], "closed");
        assert_eq!(json["accrued_minor"], 150);
        assert_eq!(json["settlements"][0]["transaction"], "tx-1");
        assert!(json.get("channel").is_none());
    }

    #[test]
    fn test_watch_output_human() {
        let text = summary().render(OutputFormat::Human);
        assert!(text.contains("duration elapsed"));
        assert!(text.contains("0.000150 USDC"));
        assert!(text.contains("tx-1"));
    }

    #[test]
    fn test_describe_spend_delta() {
        let line = describe_event(&SessionEvent::SpendDelta {
            delta_minor: 50,
            accrued_minor: 100,
            seconds: 10,
        });
        assert_eq!(line, "+0.000050 USDC for 10s (total 0.000100 USDC)");
    }
}
