//! Command-line client for metered Tollstream playback.
//!
//! This crate provides the `tollstream` binary:
//!
//! - **init**: write a default configuration file
//! - **content**: show a content item and its per-window price
//! - **watch**: run a metered session, paying for each ten-second window
//!
//! # Quick Start
//!
//! ```bash
//! tollstream init --api-url http://localhost:8000/api/v1 --viewer me
//! export TOLLSTREAM_TOKEN=...
//! tollstream content c-1
//! tollstream watch c-1 --model x402 --auto-pay --duration 60
//! ```
//!
//! # Output Formats
//!
//! All commands support `--format`:
//!
//! - `human` (default): Human-readable with colors
//! - `json`: Machine-readable JSON
//!
//! # Configuration
//!
//! Configuration is loaded from the platform config directory (or
//! `$TOLLSTREAM_DATA_DIR/config.toml`). Override with `--config`.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod progress;
pub mod prompt;
pub mod signals;

// Re-export main types
pub use cli::{Cli, Commands, ModelArg, OutputFormatArg, WatchArgs};
pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use output::{OutputFormat, Render};
