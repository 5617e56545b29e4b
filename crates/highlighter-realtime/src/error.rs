//! Error types for the realtime module.

use thiserror::Error;

/// Errors that can occur in realtime highlight detection.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Detection is already running.
    #[error("Realtime highlighter already running")]
    AlreadyRunning,

    /// Detection is not running.
    #[error("Realtime highlighter not running")]
    NotRunning,

    /// Rules or timing configuration are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An event script could not be parsed.
    #[error("Invalid event script: {0}")]
    Script(#[from] serde_json::Error),

    /// Reading an event script failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
