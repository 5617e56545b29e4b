//! Commands sent from the UI to the engine.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{ClipSource, ExportSettings, InputEvent, MarkerFormat};

/// Commands that the UI can send to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HighlighterCommand {
    /// Add clip files to a stream collection (or the global list).
    AddClips {
        paths: Vec<PathBuf>,
        stream_id: Option<String>,
        source: ClipSource,
    },

    /// Remove a clip.
    RemoveClip { path: PathBuf },

    /// Include or exclude a clip from exports.
    SetClipEnabled { path: PathBuf, enabled: bool },

    /// Trim a clip.
    TrimClip {
        path: PathBuf,
        start_trim: f64,
        end_trim: f64,
    },

    /// Reorder clips; paths are given in their new order.
    ReorderClips {
        stream_id: Option<String>,
        paths: Vec<PathBuf>,
    },

    /// Remove a stream collection and its clips.
    RemoveStream { stream_id: String },

    /// Render the enabled clips of a collection to a video file.
    Export {
        settings: ExportSettings,
        stream_id: Option<String>,
    },

    /// Cancel the running export.
    CancelExport,

    /// Write marker metadata for a collection.
    ExportMarkers {
        format: MarkerFormat,
        stream_id: Option<String>,
        path: PathBuf,
        fps: f64,
    },

    /// Start realtime highlight detection for a stream.
    StartRealtime { stream_id: String },

    /// Stop realtime highlight detection.
    StopRealtime,

    /// A vision event was detected.
    VisionEvent(InputEvent),

    /// The replay buffer finished saving.
    ReplayBufferSaved {
        path: PathBuf,
        end_time: f64,
        duration: f64,
    },

    /// Request the clips of a collection.
    GetClips { stream_id: Option<String> },

    /// Request current engine state.
    GetState,

    /// Persist the clip library.
    SaveLibrary,

    /// Shutdown the engine completely.
    Shutdown,
}
