//! Client configuration.
//!
//! Loaded from `$XDG_CONFIG_HOME/forge/config.toml`. Every field has a
//! default, so a missing file (or a partial one) is fine.
//!
//! ```toml
//! api_url = "https://pipeline.example.com"
//! request_timeout_secs = 30
//!
//! [tracker]
//! poll_interval_ms = 3000
//! max_attempts = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, Result};

/// Environment variable overriding `api_url`.
pub const API_URL_ENV: &str = "FORGE_API_URL";

/// Returns the default config file path.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("forge").join("config.toml"))
}

/// Returns the default key-value store path.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("forge")
        .join("store.json")
}

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    /// Base URL of the primary pipeline API.
    pub api_url: String,
    pub request_timeout_secs: u64,
    /// Page size for project listings.
    pub project_list_limit: usize,
    pub store_path: PathBuf,
    pub tracker: TrackerConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            project_list_limit: 50,
            store_path: default_store_path(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl ForgeConfig {
    /// Loads the config from the default path, then applies env overrides.
    pub fn load() -> Result<Self> {
        let mut config = match default_config_path() {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Loads the config from `path`. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    /// Parses config from TOML text.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Status tracker schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Delay before the first poll.
    pub initial_delay_ms: u64,
    /// Delay between polls.
    pub poll_interval_ms: u64,
    /// Attempt ceiling; the tracker times out after this many polls.
    pub max_attempts: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            poll_interval_ms: 3000,
            max_attempts: 60,
        }
    }
}

impl TrackerConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
