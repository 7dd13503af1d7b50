//! DASH Shaper - content server and traffic shaping control for testbed nodes.
//!
//! Serves a DASH stream on the content port and lets clients reshape the
//! node's interface (rate, delay, jitter, packet loss) through the control
//! port.

use std::sync::Arc;
use std::time::Duration;

mod api;
mod config;
mod error;
mod logging;
mod server;
mod shaping;

use crate::api::{build_content_router, build_control_router, ControlState};
use crate::config::{Config, ContentConfig};
use crate::server::{wait_for_termination, BindTarget, ControlService, Handler, ListenerState};
use crate::shaping::{ShapingController, SystemRunner, Wondershaper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    logging::init();

    tracing::info!("Starting DASH Shaper v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        interface = %config.server.interface,
        content_port = config.server.content_port,
        control_port = config.server.control_port,
        content_root = %config.content.root.display(),
        "Configuration loaded"
    );

    check_content(&config.content);

    // Shape the interface before anything is reachable.
    let shaper = Wondershaper::new(
        config.shaping.program.clone(),
        config.server.interface.clone(),
        Box::new(SystemRunner),
    );
    let initial = config.shaping.initial;
    let controller =
        Arc::new(tokio::task::spawn_blocking(move || ShapingController::new(shaper, initial)).await?);

    let handlers = vec![
        Handler::new("content", build_content_router(&config.content.root)),
        Handler::new(
            "control",
            build_control_router(ControlState {
                controller,
                strict_status: config.server.strict_status,
            }),
        ),
    ];
    let ports = vec![config.server.content_port, config.server.control_port];

    let target = match config.server.bind_address {
        Some(addr) => BindTarget::Address(addr),
        None => BindTarget::Interface(config.server.interface.clone()),
    };

    let mut service = ControlService::new(handlers, ports, &target)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to set up listeners");
            anyhow::anyhow!(e)
        })?
        .with_shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs));

    for binding in service.bindings() {
        tracing::info!(name = %binding.name(), address = %binding.local_addr(), "Listener bound");
    }

    service.start()?;

    tracing::info!("Starting main run loop");
    let waited = wait_for_termination().await;

    service.shutdown().await;
    let closed = service
        .bindings()
        .iter()
        .filter(|b| b.state() == ListenerState::Closed)
        .count();
    tracing::info!(state = ?service.state(), closed, "Shutting down");

    waited?;
    Ok(())
}

/// Warn when the content root or its manifest is missing.
fn check_content(content: &ContentConfig) {
    if !content.root.is_dir() {
        tracing::warn!(root = %content.root.display(), "Content root is not a directory");
    } else if !content.root.join(&content.manifest).is_file() {
        tracing::warn!(
            root = %content.root.display(),
            manifest = %content.manifest,
            "DASH manifest not found in content root"
        );
    }
}
