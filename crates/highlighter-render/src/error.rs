//! Error types for the render module.

use thiserror::Error;

/// Errors that can occur while probing, decoding, encoding or mixing.
#[derive(Debug, Error)]
pub enum RenderError {
    /// ffmpeg or ffprobe could not be located.
    #[error("{0} not found (set FFMPEG_PATH/FFPROBE_PATH or add it to PATH)")]
    BinaryNotFound(&'static str),

    /// Spawning or talking to ffmpeg failed.
    #[error("ffmpeg error: {0}")]
    Ffmpeg(String),

    /// ffmpeg exited unsuccessfully.
    #[error("ffmpeg exited with {status}: {stderr}")]
    FfmpegExit { status: String, stderr: String },

    /// Probe output could not be understood.
    #[error("Probe failed for {path}: {message}")]
    Probe { path: String, message: String },

    /// A frame source failed.
    #[error("Frame source error: {0}")]
    Source(String),

    /// A frame did not match the output format.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Nothing to render.
    #[error("No clips to render")]
    NoClips,

    /// Subtitle text could not be parsed.
    #[error("Invalid subtitles at cue {cue}: {message}")]
    Subtitles { cue: usize, message: String },

    /// Render was cancelled.
    #[error("Render cancelled")]
    Cancelled,

    /// Filesystem or pipe error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
