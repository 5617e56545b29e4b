//! Error types for marker export.

use thiserror::Error;

/// Errors that can occur while building or writing marker files.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// Timecode text could not be parsed.
    #[error("Invalid timecode: {0}")]
    InvalidTimecode(String),

    /// Frame rate is zero, negative or not finite.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    /// Writing the output file failed.
    #[error("Failed to write markers: {0}")]
    Io(#[from] std::io::Error),
}
