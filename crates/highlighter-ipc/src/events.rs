//! Events sent from the engine to the UI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state::HighlighterState;
use crate::types::{ClipInfo, ExportProgress};

/// Events that the engine can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HighlighterEvent {
    /// Engine state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<HighlighterState>,

        /// Current state.
        current: Box<HighlighterState>,
    },

    /// Clips of a collection, in order.
    Clips {
        stream_id: Option<String>,
        clips: Vec<ClipInfo>,
    },

    /// A collection changed.
    ClipsChanged { stream_id: Option<String> },

    /// Export progress update.
    ExportProgress(ExportProgress),

    /// Export finished successfully.
    ExportFinished { path: PathBuf },

    /// Export was cancelled.
    ExportCancelled,

    /// Marker metadata was written.
    MarkersExported { path: PathBuf },

    /// The realtime service wants the replay buffer saved.
    SaveReplayRequested {
        /// Recording time of the request in seconds.
        now: f64,
    },

    /// A highlight clip was created from the replay buffer.
    HighlightClipAdded { path: PathBuf },

    /// Error occurred.
    Error {
        /// Whether the error is recoverable.
        recoverable: bool,

        /// Error message.
        message: String,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
