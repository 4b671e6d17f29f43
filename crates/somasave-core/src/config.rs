//! Application configuration management.
//!
//! Holds the portal origin, the cache generation, the push application
//! server key and the last used login identifier.
//!
//! Configuration is stored at `~/.config/somasave/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "somasave";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_ORIGIN: &str = "https://somasave.netlify.app";

/// Cache generation shipped with this build. Bumping it wipes every
/// store from the previous generation on the next activation.
pub const DEFAULT_CACHE_VERSION: u32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheme and host the portal is served from.
    pub origin: String,
    pub cache_version: u32,
    /// Base64url VAPID key used when subscribing to push.
    pub vapid_public_key: Option<String>,
    pub last_username: Option<String>,
    /// Give up on a deposit confirmation after this many seconds.
    /// Unset means poll until the backend answers or the member cancels.
    pub max_poll_seconds: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            cache_version: DEFAULT_CACHE_VERSION,
            vapid_public_key: None,
            last_username: None,
            max_poll_seconds: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `SOMASAVE_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(origin) = std::env::var("SOMASAVE_ORIGIN") {
            self.origin = origin;
        }
        if let Ok(key) = std::env::var("SOMASAVE_VAPID_PUBLIC_KEY") {
            self.vapid_public_key = Some(key);
        }
        if let Some(version) = std::env::var("SOMASAVE_CACHE_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.cache_version = version;
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn app_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin '{}'", self.origin))
    }

    /// Base URL of the REST API.
    pub fn api_base_url(&self) -> String {
        format!("{}/api", self.origin.trim_end_matches('/'))
    }

    pub fn max_poll_duration(&self) -> Option<Duration> {
        self.max_poll_seconds.map(Duration::from_secs)
    }
}
