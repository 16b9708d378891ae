//! Error types shared across hooklab.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of the rule condition capability.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConditionError {
    #[error("{0}")]
    Compile(String),
    #[error("{0}")]
    Runtime(String),
}

impl ConditionError {
    /// Metric label for this kind of failure.
    pub fn kind(&self) -> &'static str {
        match self {
            ConditionError::Compile(_) => "compile",
            ConditionError::Runtime(_) => "runtime",
        }
    }
}

/// Invalid startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JSON for --response: {0}")]
    InvalidDefaultResponse(#[source] serde_json::Error),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Rule '{name}' for key '{key}' has an invalid expression: {source}")]
    InvalidRule {
        key: String,
        name: String,
        #[source]
        source: ConditionError,
    },
}

/// Failure to start serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("Failed to read local address: {0}")]
    LocalAddr(#[source] std::io::Error),
}
