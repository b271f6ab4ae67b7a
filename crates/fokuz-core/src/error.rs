//! Core error types for fokuz-core.
//!
//! This module defines the error hierarchy using thiserror. Timer and
//! storage errors are kept apart because they follow different policies:
//! invalid timer transitions are reported to the caller, while storage
//! failures are logged and swallowed by the engine and the session store.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::Phase;

/// Core error type for fokuz-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Timer state machine errors
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by the key-value persistence substrate.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The background writer is gone
    #[error("Write-behind queue closed")]
    QueueClosed,

    /// A stored value could not be decoded
    #[error("Corrupted value under '{key}': {message}")]
    Corrupted { key: String, message: String },

    /// Could not determine or create the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
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

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

/// Timer state machine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The requested operation is not allowed in the current state
    #[error("Cannot {operation} while timer is {state}")]
    InvalidTransition {
        operation: &'static str,
        state: String,
    },

    /// The operation needs an active session
    #[error("No active session")]
    NoActiveSession,
}

/// Reasons a restored snapshot is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot is in the finished phase")]
    Finished,

    #[error("running snapshot carries a paused remaining value")]
    RunningWithPausedRemaining,

    #[error("paused snapshot has no remaining value")]
    PausedWithoutRemaining,

    #[error("remaining {remaining}s exceeds {phase:?} duration {duration}s")]
    RemainingExceedsDuration {
        phase: Phase,
        remaining: u64,
        duration: u64,
    },

    #[error("credited {credited}s exceeds {phase:?} duration {duration}s")]
    CreditExceedsDuration {
        phase: Phase,
        credited: u64,
        duration: u64,
    },

    #[error("phase started in the future ({phase_start} > {now})")]
    PhaseStartInFuture { phase_start: i64, now: i64 },

    #[error("break phase without a configured break")]
    BreakWithoutDuration,

    #[error("work duration is zero")]
    ZeroWorkDuration,
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end_time ({end}) must not precede start_time ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Referenced entity does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                StorageError::Locked
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
