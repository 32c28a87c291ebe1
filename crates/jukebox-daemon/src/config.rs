use anyhow::{Context, Result};
use jukebox_common::config::{DataPaths, GeneralConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const APP_DIR: &str = "family-jukebox";
pub const CONFIG_ENV: &str = "JUKEBOX_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub spotify: SpotifyConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    #[serde(default)]
    pub system: SystemConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Built web player and admin pages, served as static files when present
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0".to_string(), port: 5000, static_dir: None }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://localhost:5000/callback".to_string(),
            scopes: vec![
                "user-read-playback-state".to_string(),
                "user-modify-playback-state".to_string(),
                "user-read-currently-playing".to_string(),
            ],
        }
    }
}

impl SpotifyConfig {
    pub fn is_configured(&self) -> bool {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => !id.is_empty() && !secret.is_empty(),
            _ => false,
        }
    }
}

/// spotifyd settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub service_name: String,
    pub config_path: String,
    pub device_name: String,
    pub bitrate: u16,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            service_name: "spotifyd".to_string(),
            config_path: "/etc/spotifyd.conf".to_string(),
            device_name: "Family Jukebox".to_string(),
            bitrate: 160,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Log OS commands instead of running them
    pub dry_run: bool,
    /// Account whose traffic the internet lockdown applies to
    pub kiosk_user: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { dry_run: false, kiosk_user: "kiosk".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub poll_interval_ms: u64,
    pub enforcement_interval_secs: u64,
    pub warning_minutes: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 1000, enforcement_interval_secs: 30, warning_minutes: 5 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AuthConfig {
    pub admin_password_hash: Option<String>,
}

impl DaemonConfig {
    /// `$JUKEBOX_CONFIG`, else `$XDG_CONFIG_HOME/family-jukebox/daemon.toml`
    pub fn default_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(APP_DIR)
            .join("daemon.toml")
    }

    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_config_path())
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        debug!("Loading daemon configuration from {:?}", config_path);

        if !config_path.exists() {
            info!(
                "Configuration file not found at {:?}, creating default configuration",
                config_path
            );
            let default_config = Self::default();
            default_config.save_to_path(config_path)?;
            return Ok(default_config);
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: DaemonConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        info!("Loaded daemon configuration from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        debug!("Saving daemon configuration to {:?}", config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let config_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Saved daemon configuration to {:?}", config_path);
        Ok(())
    }

    /// `general.data_dir`, else `$XDG_DATA_HOME/family-jukebox`
    pub fn data_dir(&self) -> PathBuf {
        match &self.general.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(APP_DIR),
        }
    }

    pub fn data_paths(&self) -> DataPaths {
        DataPaths::new(self.data_dir())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.bind_address, self.server.port);
        addr.parse().with_context(|| format!("Invalid bind address: {}", addr))
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        if self.polling.poll_interval_ms == 0 || self.polling.enforcement_interval_secs == 0 {
            anyhow::bail!("Polling intervals must be greater than zero");
        }

        if self.auth.admin_password_hash.is_none() {
            warn!("No admin password configured - set one with POST /api/auth/setup");
        }

        if !self.spotify.is_configured() {
            warn!("Spotify client credentials are not configured");
        }

        if self.system.dry_run {
            warn!("Dry run enabled - OS commands will only be logged");
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}
