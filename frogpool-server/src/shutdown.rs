//! Signal handling for graceful shutdown.

use tokio::signal::unix::{SignalKind, signal};

/// Creates a future that completes when a shutdown signal is received.
///
/// Listens for SIGTERM and SIGINT (Ctrl+C). If a handler cannot be
/// installed, the remaining one is still awaited; with neither, the
/// future never completes.
pub async fn shutdown_signal() {
    let sigterm = signal(SignalKind::terminate())
        .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGTERM handler"))
        .ok();
    let sigint = signal(SignalKind::interrupt())
        .inspect_err(|e| tracing::error!(error = %e, "Failed to install SIGINT handler"))
        .ok();

    let terminate = async {
        match sigterm {
            Some(mut s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    let interrupt = async {
        match sigint {
            Some(mut s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
        _ = interrupt => {
            tracing::info!("Received SIGINT, initiating graceful shutdown");
        }
    }
}
