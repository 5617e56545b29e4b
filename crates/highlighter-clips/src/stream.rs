//! Named stream collections.

use serde::{Deserialize, Serialize};

/// Processing state of a recorded stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    /// Highlights are still being detected.
    #[default]
    Detecting,

    /// Detection finished.
    Done,

    /// Detection failed.
    Error,

    /// Detection was cancelled by the user.
    Cancelled,
}

/// A recorded stream whose clips form one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightedStream {
    /// Collection id.
    pub id: String,

    /// Game played.
    #[serde(default)]
    pub game: String,

    /// Display title.
    #[serde(default)]
    pub title: String,

    /// Recording date as free-form text.
    #[serde(default)]
    pub date: Option<String>,

    /// Processing state.
    #[serde(default)]
    pub state: StreamState,
}

impl HighlightedStream {
    /// New collection titled after its id.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            game: String::new(),
            date: None,
            state: StreamState::default(),
        }
    }
}
