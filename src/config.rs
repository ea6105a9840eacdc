//! Configuration management
//!
//! Settings come from three layers, later ones winning:
//! 1. built-in defaults
//! 2. an optional YAML file (`--config`)
//! 3. CLI flags / environment variables (`.env` is loaded first)

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::broadcast::DEFAULT_BROADCAST_CAPACITY;
use crate::source::SourceFormat;
use crate::state::DEFAULT_STABLE_READS;

/// Default HTTP/WebSocket listen port
pub const DEFAULT_PORT: u16 = 8787;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listen port for the HTTP API and WebSocket channel
    pub port: u16,
    /// URL of the upstream text source
    pub source_url: String,
    /// Text format of the upstream source
    pub format: SourceFormat,
    /// Delay between the end of one poll cycle and the start of the next
    pub poll_interval_ms: u64,
    /// Consecutive identical reads required before a value is committed
    pub stable_reads: u32,
    /// Upper bound on a single upstream request
    pub fetch_timeout_ms: u64,
    /// Messages buffered per subscriber before it is resynchronised
    pub broadcast_capacity: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            source_url: String::new(),
            format: SourceFormat::default(),
            poll_interval_ms: 1000,
            stable_reads: DEFAULT_STABLE_READS,
            fetch_timeout_ms: 10_000,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }
}

/// CLI/environment overrides, flattened into the binary's arguments
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Listen port
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Upstream source URL
    #[arg(long, env = "SOURCE_URL")]
    pub source_url: Option<String>,

    /// Upstream text format
    #[arg(long, env = "SOURCE_FORMAT", value_enum)]
    pub format: Option<SourceFormat>,

    /// Poll interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Consecutive identical reads required to commit a value
    #[arg(long, env = "STABLE_READS")]
    pub stable_reads: Option<u32>,

    /// Upstream request timeout in milliseconds
    #[arg(long, env = "FETCH_TIMEOUT_MS")]
    pub fetch_timeout_ms: Option<u64>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?;

        Ok(config)
    }

    /// Build the effective configuration: defaults, then file, then overrides
    pub async fn resolve(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path).await?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI/environment overrides (`Some` values win)
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(url) = &overrides.source_url {
            self.source_url = url.clone();
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(n) = overrides.stable_reads {
            self.stable_reads = n;
        }
        if let Some(ms) = overrides.fetch_timeout_ms {
            self.fetch_timeout_ms = ms;
        }
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            anyhow::bail!("source_url must be set (--source-url or SOURCE_URL)");
        }
        if !(self.source_url.starts_with("http://") || self.source_url.starts_with("https://")) {
            anyhow::bail!("source_url must be an http(s) URL: {}", self.source_url);
        }
        if self.stable_reads == 0 {
            anyhow::bail!("stable_reads must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be greater than 0");
        }
        if self.fetch_timeout_ms == 0 {
            anyhow::bail!("fetch_timeout_ms must be greater than 0");
        }
        if self.broadcast_capacity == 0 {
            anyhow::bail!("broadcast_capacity must be greater than 0");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid() -> AppConfig {
        AppConfig {
            source_url: "http://localhost:8000/score.json".to_string(),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.stable_reads, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.format, SourceFormat::Json);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(valid().validate().is_ok());
        assert!(AppConfig::default().validate().is_err());

        let mut config = valid();
        config.stable_reads = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.source_url = "ftp://example.com/x".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_win() {
        let mut config = valid();
        config.apply(&ConfigOverrides {
            port: Some(9000),
            stable_reads: Some(4),
            format: Some(SourceFormat::Kv),
            ..ConfigOverrides::default()
        });
        assert_eq!(config.port, 9000);
        assert_eq!(config.stable_reads, 4);
        assert_eq!(config.format, SourceFormat::Kv);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[tokio::test]
    async fn test_resolve_from_file_then_overrides() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("steady.yaml");
        std::fs::write(
            &path,
            r#"
source_url: "http://127.0.0.1:8000/board.txt"
format: kv
poll_interval_ms: 250
broadcast_capacity: 32
"#,
        )?;

        let overrides = ConfigOverrides {
            poll_interval_ms: Some(500),
            ..ConfigOverrides::default()
        };
        let config = AppConfig::resolve(Some(&path), &overrides).await?;

        assert_eq!(config.source_url, "http://127.0.0.1:8000/board.txt");
        assert_eq!(config.format, SourceFormat::Kv);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.broadcast_capacity, 32);
        assert_eq!(config.stable_reads, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_missing_file_fails() {
        let overrides = ConfigOverrides::default();
        let result = AppConfig::resolve(Some(Path::new("/nonexistent/steady.yaml")), &overrides).await;
        assert!(result.is_err());
    }
}
