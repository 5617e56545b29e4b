//! Clip collection bookkeeping for the highlighter.
//!
//! Clips are keyed by file path and carry enable/trim/order metadata. Each
//! clip sits in the global list and in any number of named stream
//! collections.

mod clip;
mod collection;
mod error;
mod library;
mod stream;

pub use clip::{AiClipInfo, Clip, StreamClipInfo, MIN_CLIP_DURATION};
pub use collection::ClipCollection;
pub use error::ClipError;
pub use library::{ClipLibrary, LIBRARY_VERSION};
pub use stream::{HighlightedStream, StreamState};

/// Result type for clip operations.
pub type ClipResult<T> = Result<T, ClipError>;
