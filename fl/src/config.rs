//! Flitter configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::report::OverflowPolicy;

/// Default referee node path
pub const DEFAULT_REFEREE_PATH: &str = "referee/127.0.0.1:5000";

/// Reply sent to clients while the name service is busy
pub const DEFAULT_BUSY_REPLY: &str = "flitter busy";

/// Main flitter configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Referee identity
    pub referee: RefereeConfig,

    /// Service message loops
    pub looper: LooperConfig,

    /// Diagnostic report queue
    pub reporter: ReporterConfig,

    /// Network transport
    pub transport: TransportConfig,

    /// Name service
    pub name: NameConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .flitter.yml
        let local_config = PathBuf::from(".flitter.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/flitter/flitter.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("flitter").join("flitter.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Referee identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeConfig {
    /// Node path the referee listens on, `<group>/<host>:<port>`
    pub path: String,
}

impl Default for RefereeConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_REFEREE_PATH.to_string(),
        }
    }
}

/// Service message loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LooperConfig {
    /// Inbound queue capacity per service
    #[serde(rename = "queue-size")]
    pub queue_size: usize,
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self { queue_size: 64 }
    }
}

/// Diagnostic report queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// Queue capacity
    pub capacity: usize,

    /// Behavior when the queue is full
    pub overflow: OverflowPolicy,

    /// How long `block` waits for space before dropping
    #[serde(rename = "block-timeout-ms")]
    pub block_timeout_ms: u64,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            overflow: OverflowPolicy::DropNewest,
            block_timeout_ms: 100,
        }
    }
}

impl ReporterConfig {
    pub fn block_timeout(&self) -> Duration {
        Duration::from_millis(self.block_timeout_ms)
    }
}

/// Network transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connect timeout in milliseconds
    #[serde(rename = "connect-timeout-ms")]
    pub connect_timeout_ms: u64,

    /// Read/write timeout in milliseconds
    #[serde(rename = "io-timeout-ms")]
    pub io_timeout_ms: u64,

    /// Largest accepted frame body in bytes
    #[serde(rename = "max-frame-size")]
    pub max_frame_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2_000,
            io_timeout_ms: 5_000,
            max_frame_size: 64 * 1024,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }
}

/// Name service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NameConfig {
    /// Children per node in each group tree
    #[serde(rename = "fan-out")]
    pub fan_out: usize,

    /// Reply sent to lookups while busy
    #[serde(rename = "busy-reply")]
    pub busy_reply: String,

    /// Start with the busy gate closed
    pub busy: bool,
}

impl Default for NameConfig {
    fn default() -> Self {
        Self {
            fan_out: crate::node::DEFAULT_FAN_OUT,
            busy_reply: DEFAULT_BUSY_REPLY.to_string(),
            busy: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.referee.path, DEFAULT_REFEREE_PATH);
        assert_eq!(config.looper.queue_size, 64);
        assert_eq!(config.reporter.capacity, 100);
        assert_eq!(config.reporter.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.transport.max_frame_size, 64 * 1024);
        assert_eq!(config.name.fan_out, 2);
        assert_eq!(config.name.busy_reply, "flitter busy");
        assert!(!config.name.busy);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
referee:
  path: "ref/10.1.1.1:7000"
reporter:
  overflow: block
  block-timeout-ms: 250
name:
  fan-out: 4
  busy: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.referee.path, "ref/10.1.1.1:7000");
        assert_eq!(config.reporter.overflow, OverflowPolicy::Block);
        assert_eq!(config.reporter.block_timeout(), Duration::from_millis(250));
        assert_eq!(config.reporter.capacity, 100);
        assert_eq!(config.name.fan_out, 4);
        assert_eq!(config.name.busy_reply, DEFAULT_BUSY_REPLY);
        assert!(config.name.busy);
        assert_eq!(config.looper.queue_size, 64);
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flitter.yml");
        fs::write(&path, "looper:\n  queue-size: 8\ntransport:\n  io-timeout-ms: 10\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.looper.queue_size, 8);
        assert_eq!(config.transport.io_timeout(), Duration::from_millis(10));
        assert_eq!(config.transport.connect_timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to load config"));
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yml");
        fs::write(&path, "looper: [not, a, map]").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
