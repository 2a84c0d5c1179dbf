//! Core error types for standwell-core.
//!
//! Scheduler, backoff and nudge operations never fail: guard violations are
//! silent no-ops. Errors here only come from the edges (configuration,
//! storage, notification delivery).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for standwell-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// SQLite errors from the local store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The home/config directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(PathBuf),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),
}

/// Notification delivery errors.
///
/// Delivery is best-effort: callers log these and carry on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No notification backend is available (e.g. headless session)
    #[error("notification backend unavailable")]
    Unavailable,

    /// The user has not granted notification permission
    #[error("notification permission denied")]
    Denied,

    /// The backend accepted the request but failed to deliver it
    #[error("notification delivery failed: {0}")]
    Failed(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
