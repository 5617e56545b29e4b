//! Typed UI<->Engine messages for the highlighter.
//!
//! This crate defines all the message types used for communication between
//! a UI shell and the highlighter engine, plus the value types shared by the
//! other crates.

mod commands;
mod events;
mod state;
mod types;

pub use commands::HighlighterCommand;
pub use events::HighlighterEvent;
pub use state::{ExportPhase, HighlighterState};
pub use types::{
    ClipInfo, ClipSource, ExportProgress, ExportSettings, ExportStep, Fps, InputEvent, InputKind,
    MarkerFormat, MusicSettings, Orientation, Preset, Resolution, TransitionKind,
    TransitionSettings,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (UI → Engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (Engine → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<HighlighterCommand>, Receiver<HighlighterCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<HighlighterEvent>, Receiver<HighlighterEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
