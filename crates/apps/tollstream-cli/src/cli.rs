//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tollstream_types::SettlementModel;

use crate::output::OutputFormat;

/// Tollstream metered playback client.
#[derive(Parser, Debug)]
#[command(name = "tollstream")]
#[command(author = "Tollstream Contributors")]
#[command(version)]
#[command(about = "Pay-per-second streaming from the command line")]
#[command(
    long_about = "Tollstream meters playback in ten-second credit windows and pays for each one through a payment channel or x402.\n\nRun 'tollstream init' to get started."
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (human or json). Defaults to display.default_format.
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormatArg>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Output format argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormatArg {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Human => OutputFormat::Human,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Settlement model argument for clap.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ModelArg {
    /// Open/tick/close payment channel.
    Channel,
    /// x402 challenge per window.
    X402,
}

impl From<ModelArg> for SettlementModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Channel => SettlementModel::Channel,
            ModelArg::X402 => SettlementModel::X402,
        }
    }
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,

        /// Backend API base URL.
        #[arg(long)]
        api_url: Option<String>,

        /// Viewer identifier.
        #[arg(long)]
        viewer: Option<String>,

        /// Default settlement model.
        #[arg(long, value_enum)]
        model: Option<ModelArg>,
    },

    /// Show a content item and its per-window price.
    Content {
        /// Content ID.
        content_id: String,
    },

    /// Watch a content item, paying for each ten-second window.
    ///
    /// Runs until the duration elapses, Ctrl-C, a declined payment or a
    /// session error, then stops the session and prints what was spent.
    Watch(WatchArgs),
}

/// Arguments for `watch`.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Content ID.
    pub content_id: String,

    /// Settlement model (overrides session.model).
    #[arg(long, value_enum)]
    pub model: Option<ModelArg>,

    /// Seconds to watch. Defaults to the content length.
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Pay x402 challenges without asking.
    #[arg(long)]
    pub auto_pay: bool,

    /// Payment-Signature header to answer the first challenge with.
    #[arg(long, env = "TOLLSTREAM_PAYMENT_SIGNATURE", hide_env_values = true)]
    pub signature: Option<String>,

    /// Stop once this many minor units have accrued.
    #[arg(long)]
    pub max_spend: Option<u64>,
}
