//! Application configuration management.
//!
//! Configuration is stored at `~/.config/vehicle-lister/config.json`. Missing
//! files and missing fields fall back to defaults, and a few environment
//! variables override the file (useful with a `.env`).

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "vehicle-lister";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_PROJECT_ID: &str = "VEHICLE_LISTER_PROJECT_ID";
pub const ENV_API_KEY: &str = "VEHICLE_LISTER_API_KEY";
pub const ENV_DATA_DIR: &str = "VEHICLE_LISTER_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub firestore_base_url: String,
    pub project_id: String,
    pub api_key: Option<String>,
    pub asset_base_url: String,
    /// Applies to every remote query and image fetch
    pub request_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            firestore_base_url: "https://firestore.googleapis.com/v1".to_string(),
            project_id: "west-webshop".to_string(),
            api_key: None,
            asset_base_url: "https://storage.googleapis.com/west-webshop.appspot.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Random cars sampled per session
    pub sample_size: usize,
    pub sample_min_index: u32,
    pub sample_max_index: u32,
    /// Concurrent chassis picture downloads
    pub image_concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sample_size: 3,
            sample_min_index: *crate::remote::SAMPLE_INDEX_RANGE.start(),
            sample_max_index: *crate::remote::SAMPLE_INDEX_RANGE.end(),
            image_concurrency: 4,
        }
    }
}

impl SyncConfig {
    /// Inclusive sample bounds, tolerating a reversed min/max.
    pub fn sample_range(&self) -> RangeInclusive<u32> {
        let (lo, hi) = if self.sample_min_index <= self.sample_max_index {
            (self.sample_min_index, self.sample_max_index)
        } else {
            (self.sample_max_index, self.sample_min_index)
        };
        lo..=hi
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
    /// Per-brand chassis listing TTL; None uses the cache default
    pub summary_cache_ttl_minutes: Option<i64>,
    /// Overrides the platform cache directory
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Apply overrides from a key lookup (the process environment in practice).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(project) = lookup(ENV_PROJECT_ID).filter(|v| !v.is_empty()) {
            self.remote.project_id = project;
        }
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.is_empty()) {
            self.remote.api_key = Some(key);
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Root for the local store, summary cache and logs.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn store_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("store"))
    }

    pub fn summary_cache_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("chassis-summaries"))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join("logs"))
    }
}
