//! Error types for the engine.

use thiserror::Error;

use highlighter_clips::ClipError;
use highlighter_markers::MarkerError;
use highlighter_realtime::RealtimeError;
use highlighter_render::RenderError;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine is doing something that excludes this request.
    #[error("Engine busy: {0}")]
    Busy(&'static str),

    /// No enabled, loaded clips in the collection.
    #[error("No clips to export")]
    NoClips,

    /// No library file is configured.
    #[error("No clip library configured")]
    NoLibrary,

    #[error(transparent)]
    Clip(#[from] ClipError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Markers(#[from] MarkerError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// Filesystem error outside the media pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Whether the user can retry after fixing input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Render(RenderError::BinaryNotFound(_)) | Self::Io(_)
        )
    }

    /// Whether this is a user cancel rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Render(RenderError::Cancelled))
    }
}
