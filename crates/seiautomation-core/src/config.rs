//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, where the session token is kept, the run polling
//! interval, and the last email used to log in.
//!
//! Configuration is stored at `~/.config/seiautomation/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_REQUEST_TIMEOUT_SECS;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "seiautomation";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Base URL of a locally running automation server
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// How often the dashboard reloads the run list.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Overrides `api_base_url`
pub const ENV_API_URL: &str = "SEIAUTOMATION_API_URL";
/// Pre-fills the login email
pub const ENV_EMAIL: &str = "SEIAUTOMATION_EMAIL";
/// Pre-fills the login password
pub const ENV_PASSWORD: &str = "SEIAUTOMATION_PASSWORD";

/// Where the session token is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    Keyring,
    File,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub token_store: TokenStoreKind,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token_store: TokenStoreKind::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            last_email: None,
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

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply overrides from environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
    }

    /// Poll interval, never shorter than one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "http://localhost:8000");
        assert_eq!(config.token_store, TokenStoreKind::Keyring);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"token_store": "file", "last_email": "ana@example.com"}"#)
                .expect("Failed to parse config");
        assert_eq!(config.token_store, TokenStoreKind::File);
        assert_eq!(config.last_email.as_deref(), Some("ana@example.com"));
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
    }

    #[test]
    fn test_env_override_for_base_url() {
        let mut config = Config::default();
        config.apply_overrides(|key| {
            (key == ENV_API_URL).then(|| " https://automacao.example.gov.br ".to_string())
        });
        assert_eq!(config.api_base_url, "https://automacao.example.gov.br");

        config.apply_overrides(|_| Some("   ".to_string()));
        assert_eq!(config.api_base_url, "https://automacao.example.gov.br");
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = Config {
            poll_interval_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
