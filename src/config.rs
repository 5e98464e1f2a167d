//! Configuration for a diff run.
//!
//! Values come from an optional TOML file and are then overridden by
//! command-line flags.
//!
//! # Example
//!
//! ```
//! use rediff::DiffConfig;
//!
//! let config: DiffConfig = toml::from_str(r#"
//!     client_a = "cache-primary"
//!     client_b = "cache-replica:6380"
//!     pool_size = 8
//!     exclude = ["session:*"]
//! "#).unwrap();
//!
//! assert_eq!(config.pool_size, 8);
//! assert_eq!(config.interval_ms, 0);
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DiffError;
use crate::pool::SelectionPolicy;
use crate::store::{Endpoint, DEFAULT_PORT};

/// Settings for one run. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiffConfig {
    /// Side A, `host[:port]` or `redis://` URL
    #[serde(default)]
    pub client_a: Option<String>,

    /// Side B, `host[:port]` or `redis://` URL
    #[serde(default)]
    pub client_b: Option<String>,

    /// Handles per side (default: 5)
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Minimum spacing between per-key dispatches in ms (0 = no limit)
    #[serde(default)]
    pub interval_ms: u64,

    /// Cap on outstanding per-key tasks (0 = no cap)
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    #[serde(default)]
    pub selection: SelectionPolicy,

    /// Keyspace scan pattern
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Glob patterns of keys to leave out of the diff
    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub output_unique: bool,
    #[serde(default)]
    pub output_shared: bool,
    #[serde(default)]
    pub output_different: bool,

    #[serde(default)]
    pub quiet: bool,

    /// Copy A onto B after diffing
    #[serde(default)]
    pub write: bool,

    /// Print the report as JSON
    #[serde(default)]
    pub json: bool,

    #[serde(default = "default_port")]
    pub default_port: u16,
}

fn default_pool_size() -> usize {
    5
}

fn default_max_in_flight() -> usize {
    64
}

fn default_pattern() -> String {
    "*".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            client_a: None,
            client_b: None,
            pool_size: default_pool_size(),
            interval_ms: 0,
            max_in_flight: default_max_in_flight(),
            selection: SelectionPolicy::default(),
            pattern: default_pattern(),
            exclude: Vec::new(),
            output_unique: false,
            output_shared: false,
            output_different: false,
            quiet: false,
            write: false,
            json: false,
            default_port: default_port(),
        }
    }
}

impl DiffConfig {
    /// Default config file location, `<config dir>/rediff/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rediff").join("config.toml"))
    }

    /// Load from an explicit path, else from the default path if it exists,
    /// else return defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, DiffError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, DiffError> {
        let content = std::fs::read_to_string(path).map_err(|e| DiffError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| DiffError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Parse both endpoints; fails if either is missing or malformed.
    pub fn endpoints(&self) -> Result<(Endpoint, Endpoint), DiffError> {
        let parse = |value: &Option<String>, flag: &str| -> Result<Endpoint, DiffError> {
            let raw = value
                .as_deref()
                .ok_or_else(|| DiffError::Config(format!("missing required {}", flag)))?;
            Endpoint::parse(raw, self.default_port)
                .ok_or_else(|| DiffError::InvalidEndpoint(raw.to_string()))
        };
        Ok((parse(&self.client_a, "--clienta")?, parse(&self.client_b, "--clientb")?))
    }

    pub fn validate(&self) -> Result<(), DiffError> {
        if self.pool_size == 0 {
            return Err(DiffError::Config("pool size must be at least 1".to_string()));
        }
        if self.pattern.is_empty() {
            return Err(DiffError::Config("scan pattern must not be empty".to_string()));
        }
        self.endpoints().map(|_| ())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
