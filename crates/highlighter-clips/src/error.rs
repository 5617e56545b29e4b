//! Error types for clip bookkeeping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while managing clips.
#[derive(Debug, Error)]
pub enum ClipError {
    /// No clip with this path.
    #[error("Clip not found: {}", .0.display())]
    ClipNotFound(PathBuf),

    /// A clip with this path already exists.
    #[error("Clip already exists: {}", .0.display())]
    DuplicateClip(PathBuf),

    /// No stream with this id.
    #[error("Stream not found: {0}")]
    StreamNotFound(String),

    /// Trim values are negative or leave too little footage.
    #[error("Invalid trim for {}: start {start}, end {end}", path.display())]
    InvalidTrim {
        path: PathBuf,
        start: f64,
        end: f64,
    },

    /// Duration is zero, negative or not finite.
    #[error("Invalid duration {duration} for {}", path.display())]
    InvalidDuration { path: PathBuf, duration: f64 },

    /// Reorder request does not match the collection.
    #[error("Invalid ordering: {0}")]
    InvalidOrder(String),

    /// Library file could not be read or written.
    #[error("Library I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library file is not valid JSON.
    #[error("Library format error: {0}")]
    Format(#[from] serde_json::Error),
}
