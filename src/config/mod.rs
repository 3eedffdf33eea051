//! Configuration management for cuebridge
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub qlc: QlcConfig,
    #[serde(default)]
    pub cues: CuesConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

/// QLC+ websocket endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QlcConfig {
    #[serde(default = "default_qlc_url")]
    pub url: String,
}

/// Cue label configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CuesConfig {
    /// Marker prefix; a label fires when it contains `"<prefix>:<ids>"`
    #[serde(default = "default_cue_prefix")]
    pub prefix: String,
}

/// Host event feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_bind")]
    pub bind: String,
}

impl Default for QlcConfig {
    fn default() -> Self {
        Self {
            url: default_qlc_url(),
        }
    }
}

impl Default for CuesConfig {
    fn default() -> Self {
        Self {
            prefix: default_cue_prefix(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            bind: default_feed_bind(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.qlc.url.is_empty() {
            anyhow::bail!("QLC+ url cannot be empty");
        }
        if !self.qlc.url.starts_with("ws://") && !self.qlc.url.starts_with("wss://") {
            anyhow::bail!(
                "QLC+ url must start with ws:// or wss:// (got '{}')",
                self.qlc.url
            );
        }

        if self.cues.prefix.is_empty() {
            anyhow::bail!("Cue prefix cannot be empty");
        }
        // The marker is "<prefix>:" followed by a digit list; a prefix
        // carrying digits, commas, or whitespace would blur that boundary
        if self
            .cues
            .prefix
            .chars()
            .any(|c| c.is_ascii_digit() || c == ',' || c.is_whitespace())
        {
            anyhow::bail!(
                "Cue prefix must not contain digits, commas, or whitespace (got '{}')",
                self.cues.prefix
            );
        }

        self.feed
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid feed bind address: '{}'", self.feed.bind))?;

        Ok(())
    }

    /// Feed bind address as a socket address (validated)
    pub fn feed_addr(&self) -> Result<SocketAddr> {
        self.feed
            .bind
            .parse()
            .with_context(|| format!("Invalid feed bind address: '{}'", self.feed.bind))
    }
}

// Default value functions
fn default_qlc_url() -> String {
    "ws://127.0.0.1:9999/qlcplusWS".to_string()
}
fn default_cue_prefix() -> String {
    "QLC".to_string()
}
fn default_feed_bind() -> String {
    crate::feed::DEFAULT_BIND.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_sections_get_defaults() {
        let config: AppConfig = serde_yaml::from_str("cues:\n  prefix: \"LIGHT\"\n").unwrap();
        assert_eq!(config.qlc.url, "ws://127.0.0.1:9999/qlcplusWS");
        assert_eq!(config.cues.prefix, "LIGHT");
        assert_eq!(config.feed.bind, "127.0.0.1:8126");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_websocket_url() {
        let mut config = AppConfig::default();
        config.qlc.url = "http://127.0.0.1:9999".to_string();
        assert!(config.validate().is_err());

        config.qlc.url = "wss://lighting.local/qlcplusWS".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_ambiguous_prefix() {
        for bad in ["", "Q1", "A,B", "QL C", "QLC "] {
            let mut config = AppConfig::default();
            config.cues.prefix = bad.to_string();
            assert!(config.validate().is_err(), "prefix {:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_validate_rejects_unparseable_bind() {
        let mut config = AppConfig::default();
        config.feed.bind = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.yaml");
        let path = path.to_string_lossy();

        let mut config = AppConfig::default();
        config.cues.prefix = "LIGHT".to_string();
        config.save(&path).await?;

        let loaded = AppConfig::load(&path).await?;
        assert_eq!(loaded.cues.prefix, "LIGHT");
        assert_eq!(loaded.qlc.url, config.qlc.url);
        Ok(())
    }
}
