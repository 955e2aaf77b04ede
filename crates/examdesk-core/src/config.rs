//! Application configuration management.
//!
//! Configuration is stored at `~/.config/examdesk/config.json`. Missing
//! fields fall back to defaults, so an empty file is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::prefetch::{
    IdleStrategy, DEFAULT_FALLBACK_DELAY_MS, DEFAULT_IDLE_TIMEOUT_MS,
    DEFAULT_MAX_CONCURRENT_PREFETCHES,
};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "examdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Overrides `api_base_url` when set
pub const API_URL_ENV: &str = "EXAMDESK_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    /// Directory of the persistent storage medium; defaults to the user
    /// cache dir.
    pub storage_dir: Option<PathBuf>,
    pub prefetch: PrefetchConfig,
    pub ttl: TtlConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            storage_dir: None,
            prefetch: PrefetchConfig::default(),
            ttl: TtlConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub max_concurrent: usize,
    pub idle_timeout_ms: u64,
    pub fallback_delay_ms: u64,
    pub strategy: IdleStrategy,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT_PREFETCHES,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            fallback_delay_ms: DEFAULT_FALLBACK_DELAY_MS,
            strategy: IdleStrategy::default(),
        }
    }
}

impl PrefetchConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub dashboard_minutes: i64,
    pub tables_minutes: i64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            dashboard_minutes: 5,
            tables_minutes: 10,
        }
    }
}

impl TtlConfig {
    pub fn dashboard(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.dashboard_minutes)
    }

    pub fn tables(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.tables_minutes)
    }
}

impl Config {
    /// Load from the user config dir, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.storage_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url.trim().to_string();
            }
        }
    }
}
