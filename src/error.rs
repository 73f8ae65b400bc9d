//! Error types for ocihunt
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in ocihunt
#[derive(Debug, Error)]
pub enum HuntError {
    /// `start` was called while a run is still active
    #[error("A run is already active")]
    AlreadyRunning,

    /// `stop` was called while no run is active
    #[error("No run is active")]
    NotRunning,

    /// Missing or invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Provider capability could not be invoked
    #[error("Provider error: {0}")]
    Provider(String),

    /// Result persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IPC communication error
    #[error("IPC error: {0}")]
    Ipc(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HuntError {
    /// Errors caused by calling engine controls in the wrong state.
    ///
    /// These never affect a run already in progress.
    pub fn is_misuse(&self) -> bool {
        matches!(self, HuntError::AlreadyRunning | HuntError::NotRunning)
    }
}

/// Result type alias for ocihunt operations
pub type Result<T> = std::result::Result<T, HuntError>;
