use anyhow::Result;
use jukebox_daemon::config::DaemonConfig;
use jukebox_daemon::daemon;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = DaemonConfig::default_config_path();
    let config = DaemonConfig::load_from_path(&config_path)?;

    let default_level = config.general.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Family Jukebox daemon (config: {:?})", config_path);

    if let Err(e) = daemon::run(config, config_path).await {
        error!("Daemon error: {:#}", e);
        return Err(e);
    }

    info!("Family Jukebox daemon stopped");
    Ok(())
}
