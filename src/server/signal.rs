//! Termination signal handling.

use std::io;

/// Wait until the process is asked to terminate.
///
/// SIGTERM on unix hosts, Ctrl-C elsewhere. Delivery is handled by tokio's
/// signal driver, so nothing runs inside the raw handler.
#[cfg(unix)]
pub async fn wait_for_termination() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    terminate.recv().await;
    tracing::info!("Received SIGTERM");
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_termination() -> io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");
    Ok(())
}
