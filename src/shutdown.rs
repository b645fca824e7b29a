use std::io;
use tracing::{error, info};

/// Resolves once Ctrl+C is received.
pub async fn shutdown_signal() {
    wait_for(tokio::signal::ctrl_c()).await
}

/// A signal that cannot be installed never resolves, so the server keeps
/// running instead of stopping at once.
async fn wait_for<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Failed to install Ctrl+C handler; graceful shutdown is unavailable");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
