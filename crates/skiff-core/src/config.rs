//! Daemon configuration.
//!
//! Loaded from a TOML file and/or overridden by command-line flags in
//! `skiffd`. Every option has a default suitable for local development.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Network endpoint the API server listens on.
    pub listen_addr: String,
    /// Directory holding the persisted resource snapshots.
    pub data_dir: PathBuf,
    /// Enable debug detail in API error responses.
    pub debug: bool,
    pub runtime: RuntimeConfig,
}

/// Configuration handed to the container-runtime driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Driver name resolved at startup (`fake`; daemon drivers plug in
    /// behind the same registry).
    pub driver: String,
    /// Path to the runtime daemon's socket.
    pub socket_path: String,
    /// Timeout for individual runtime operations, in seconds.
    pub timeout_secs: u64,
    /// Network new containers are attached to.
    pub default_network: String,
    /// Labels applied to every container the orchestrator creates, in
    /// addition to the ownership schema.
    pub default_labels: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("./data"),
            debug: false,
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            driver: "fake".to_string(),
            socket_path: String::new(),
            timeout_secs: 30,
            default_network: "skiff".to_string(),
            default_labels: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
