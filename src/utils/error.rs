//! Error types and handling
//!
//! Common error types used across the bridge.

use std::path::PathBuf;
use thiserror::Error;

/// Bridge-wide error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Stream start error: {0}")]
    StreamStart(String),

    #[error("File system error at {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl BridgeError {
    /// Wrap an IO failure on a specific path
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BridgeError::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Stable code for logs and host-facing messages
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Io(_) => "IO_ERROR",
            BridgeError::Serialization(_) => "SERIALIZATION_ERROR",
            BridgeError::Credential(_) => "CREDENTIAL_ERROR",
            BridgeError::Connection(_) => "CONNECTION_ERROR",
            BridgeError::StreamStart(_) => "STREAM_START_ERROR",
            BridgeError::FileSystem { .. } => "FILE_SYSTEM_ERROR",
            BridgeError::Watcher(_) => "WATCHER_ERROR",
            BridgeError::Config(_) => "CONFIG_ERROR",
        }
    }
}

/// Result type alias using BridgeError
pub type BridgeResult<T> = Result<T, BridgeError>;
