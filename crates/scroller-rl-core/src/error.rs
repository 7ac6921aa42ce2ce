//! Error types for the RL core library

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for RL operations
#[derive(Error, Debug)]
pub enum RLError {
    /// Perception or actuation backend cannot reach the game window
    #[error("Environment unavailable: {0}")]
    EnvironmentUnavailable(String),

    /// Action universe configured with zero members
    #[error("Action universe is empty")]
    EmptyActionUniverse,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Action key contains a symbol name that is not recognised
    #[error("Unknown input symbol: {0}")]
    UnknownSymbol(String),

    /// Failure reading or writing the persisted reward table
    #[error("Storage error at {path}: {source}")]
    Storage {
        /// Location of the reward table
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl RLError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for RL operations
pub type Result<T> = std::result::Result<T, RLError>;
