//! Interactive prompt utilities for CLI commands.

use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::ProgressBar;
use std::io::{self, IsTerminal};

/// Check if we're running in an interactive terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Prompt for confirmation with a yes/no question.
///
/// Returns `Ok(true)` if user confirmed, `Ok(false)` if declined.
pub fn confirm(prompt: &str) -> io::Result<bool> {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Ask on a blocking thread with `bar` hidden while the prompt is up.
pub async fn confirm_async(prompt: String, bar: ProgressBar) -> io::Result<bool> {
    tokio::task::spawn_blocking(move || bar.suspend(|| confirm(&prompt)))
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
}
