//! Configuration management (TOML)

use crate::histogram::DEFAULT_WINDOW;
use crate::payload::DEFAULT_ENVELOPE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Delay between ingestion cycles for live sources.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    /// Histogram bucket width in raw time units.
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    #[serde(default = "default_recent_trees")]
    pub recent_trees: usize,
    /// JSON pointer to the tree list in enveloped snapshots.
    #[serde(default = "default_envelope")]
    pub envelope: String,
}

/// Where snapshots come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Poll `http://<host>/<endpoint>` on every cycle.
    Remote {
        host: String,
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },
    /// Read a snapshot file once.
    File { path: PathBuf },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,
}

fn default_refresh_interval_ms() -> u64 {
    1000
}

fn default_window_size() -> u64 {
    DEFAULT_WINDOW.get()
}

fn default_recent_trees() -> usize {
    10
}

fn default_envelope() -> String {
    DEFAULT_ENVELOPE.to_string()
}

fn default_endpoint() -> String {
    "call_tree".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            refresh_interval_ms: default_refresh_interval_ms(),
            window_size: default_window_size(),
            recent_trees: default_recent_trees(),
            envelope: default_envelope(),
        }
    }
}

impl GeneralConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Configured window, or the default when zero.
    pub fn window(&self) -> NonZeroU64 {
        NonZeroU64::new(self.window_size).unwrap_or(DEFAULT_WINDOW)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Remote {
            host: "localhost:20000".to_string(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl SourceConfig {
    pub fn remote(host: impl Into<String>) -> Self {
        SourceConfig::Remote {
            host: host.into(),
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        SourceConfig::File { path: path.into() }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, content).map_err(io_err)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "reactmon")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }
}
