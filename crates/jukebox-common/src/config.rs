use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const PARENTAL_CONFIG_FILE: &str = "parental_config.json";
pub const SCHEDULE_FILE: &str = "schedule.json";
pub const USAGE_STATS_FILE: &str = "usage_stats.json";
pub const REWARDS_FILE: &str = "rewards.json";
pub const SPOTIFY_TOKEN_FILE: &str = "spotify_token.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { data_dir: None, log_level: "info".to_string() }
    }
}

/// Locations of the JSON documents under the application data directory
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn parental_config(&self) -> PathBuf {
        self.root.join(PARENTAL_CONFIG_FILE)
    }

    pub fn schedule(&self) -> PathBuf {
        self.root.join(SCHEDULE_FILE)
    }

    pub fn usage_stats(&self) -> PathBuf {
        self.root.join(USAGE_STATS_FILE)
    }

    pub fn rewards(&self) -> PathBuf {
        self.root.join(REWARDS_FILE)
    }

    pub fn spotify_token(&self) -> PathBuf {
        self.root.join(SPOTIFY_TOKEN_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_config_default() {
        let config = GeneralConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_data_paths_join_root() {
        let paths = DataPaths::new("/var/lib/jukebox");
        assert_eq!(paths.usage_stats(), PathBuf::from("/var/lib/jukebox/usage_stats.json"));
        assert_eq!(paths.rewards(), PathBuf::from("/var/lib/jukebox/rewards.json"));
    }
}
