use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::api;
use crate::config::DaemonConfig;
use crate::enforcement_task::ListeningEnforcementTask;
use crate::poller::PlaybackPoller;
use crate::service::KioskService;

pub async fn run(config: DaemonConfig, config_path: PathBuf) -> Result<()> {
    info!("Initializing daemon");

    config.validate()?;
    let addr = config.bind_addr()?;
    let polling = config.polling.clone();
    let static_dir = config.server.static_dir.clone();

    let service = KioskService::init(config, config_path)?;

    let poller = PlaybackPoller::new(service.clone())
        .spawn(Duration::from_millis(polling.poll_interval_ms));
    let enforcement = ListeningEnforcementTask::new(service.clone(), polling.warning_minutes)
        .spawn(Duration::from_secs(polling.enforcement_interval_secs));

    let app = api::router(service.clone(), static_dir.as_deref());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("REST API listening on http://{}", addr);
    info!("Daemon running, waiting for shutdown signal...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    poller.abort();
    enforcement.abort();
    service.shutdown().await;

    info!("Daemon shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let (mut sigterm, mut sigint) = match (
            signal::unix::signal(signal::unix::SignalKind::terminate()),
            signal::unix::signal(signal::unix::SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                warn!("Failed to install signal handlers, falling back to Ctrl+C");
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down gracefully...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C, shutting down gracefully...");
    }
}
