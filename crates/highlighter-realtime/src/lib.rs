//! Highlight detection for the highlighter.
//!
//! [`derive_highlights`] turns a batch of detected inputs into time ranges.
//! [`RealtimeHighlighter`] makes the same decision incrementally while a
//! recording runs, driving replay buffer saves.

mod error;
mod highlights;
mod mock;
mod service;

pub use error::RealtimeError;
pub use highlights::{derive_highlights, HighlightRules, HighlightWindow, KindRule};
pub use mock::{MockVisionHandle, MockVisionService};
pub use service::{RealtimeAction, RealtimeConfig, RealtimeHighlighter, RealtimeInput};

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;
