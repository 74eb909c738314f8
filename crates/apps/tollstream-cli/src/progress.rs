//! Progress bar utilities for CLI commands.

use std::future::Future;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner progress bar with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a hidden progress bar (no-op).
///
/// Use this when running in non-interactive mode or JSON output.
pub fn hidden() -> ProgressBar {
    ProgressBar::hidden()
}

/// Bar counting granted windows. `total` is zero when the length is unknown,
/// in which case a spinner is shown instead.
pub fn window_bar(total: u64) -> ProgressBar {
    if total == 0 {
        return spinner("waiting for the first window");
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} windows {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run an async operation with a spinner, returning the result.
///
/// The spinner displays while the operation runs and is cleared on completion.
pub async fn with_spinner<F, T>(msg: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let pb = spinner(msg);
    let result = fut.await;
    pb.finish_and_clear();
    result
}
