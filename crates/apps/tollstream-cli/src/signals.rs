//! Signal handling for graceful shutdown.
//!
//! A watched session is stopped (and its channel closed) on SIGINT or
//! SIGTERM instead of being dropped mid-window.

use tokio::sync::watch;
use tracing::warn;

/// Creates a shutdown signal receiver that triggers on SIGINT or SIGTERM.
///
/// Returns a `watch::Receiver<bool>` that changes to `true` when a shutdown
/// signal is received.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = tx.send(true);
    });

    rx
}

/// Wait for either SIGINT or SIGTERM.
///
/// A handler that cannot be installed never fires.
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
