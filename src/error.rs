// Centralized error handling module
// Splits store faults into transport (fatal) and per-key command (non-fatal) errors

use std::path::PathBuf;
use thiserror::Error;

use crate::pool::Side;

/// Error returned by a single store handle.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The handle can no longer reach its store.
    #[error("transport failure talking to {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The store rejected a command for one key.
    #[error("[{command}] for '{key}' reported: {reason}")]
    Command {
        command: &'static str,
        key: String,
        reason: String,
    },
}

impl StoreError {
    pub fn command(command: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Command {
            command,
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        StoreError::Transport {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Transport faults abort the whole run; everything else only degrades the report.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Transport { .. })
    }
}

/// Errors that abort a diff run
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("could not connect to side {side}: {source}\nSuggestion: check that the host is reachable and the port is correct")]
    Connection {
        side: Side,
        #[source]
        source: StoreError,
    },

    #[error("lost connection during run: {0}\nSuggestion: re-run once the store is reachable again")]
    Transport(#[source] StoreError),

    #[error("invalid configuration: {0}\nSuggestion: run with --help to see usage information")]
    Config(String),

    #[error("failed to load config file {}: {reason}", path.display())]
    ConfigFile { path: PathBuf, reason: String },

    #[error("invalid endpoint '{0}'\nSuggestion: use host, host:port or a redis:// URL")]
    InvalidEndpoint(String),
}

impl DiffError {
    /// Lift a store error raised mid-run. Only transport faults should get here.
    pub fn from_store(err: StoreError) -> Self {
        DiffError::Transport(err)
    }
}
