//! Marker model shared by the exporters.

use serde::{Deserialize, Serialize};

use highlighter_ipc::InputKind;

/// Marker colour, using the palette NLEs understand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkerColor {
    #[default]
    Blue,
    Cyan,
    Green,
    Yellow,
    Red,
    Pink,
    Purple,
    Fuchsia,
    Rose,
    Lavender,
    Sky,
    Mint,
    Lemon,
    Sand,
    Cocoa,
    Cream,
}

impl MarkerColor {
    /// Colour name as written into EDL comments.
    pub fn name(self) -> &'static str {
        match self {
            Self::Blue => "Blue",
            Self::Cyan => "Cyan",
            Self::Green => "Green",
            Self::Yellow => "Yellow",
            Self::Red => "Red",
            Self::Pink => "Pink",
            Self::Purple => "Purple",
            Self::Fuchsia => "Fuchsia",
            Self::Rose => "Rose",
            Self::Lavender => "Lavender",
            Self::Sky => "Sky",
            Self::Mint => "Mint",
            Self::Lemon => "Lemon",
            Self::Sand => "Sand",
            Self::Cocoa => "Cocoa",
            Self::Cream => "Cream",
        }
    }

    /// Colour for the dominant input of a highlight.
    pub fn for_input(kind: InputKind) -> Self {
        match kind {
            InputKind::Kill | InputKind::BestKill | InputKind::Elimination => Self::Red,
            InputKind::Knocked => Self::Yellow,
            InputKind::Death | InputKind::PlayerKnocked => Self::Purple,
            InputKind::Victory => Self::Green,
            InputKind::Defeat => Self::Cocoa,
            InputKind::Deploy | InputKind::StartGame | InputKind::EndGame => Self::Blue,
        }
    }
}

/// A named position on the exported timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Marker name.
    pub name: String,

    /// Optional longer text.
    #[serde(default)]
    pub description: String,

    /// Start in seconds from the beginning of the timeline.
    pub start_secs: f64,

    /// Length in seconds; zero for point markers.
    #[serde(default)]
    pub duration_secs: f64,

    /// Marker colour.
    #[serde(default)]
    pub color: MarkerColor,
}

impl Marker {
    /// Point marker with the default colour.
    pub fn new(name: impl Into<String>, start_secs: f64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            start_secs,
            duration_secs: 0.0,
            color: MarkerColor::default(),
        }
    }

    /// Builder: set the duration.
    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Builder: set the colour.
    pub fn with_color(mut self, color: MarkerColor) -> Self {
        self.color = color;
        self
    }
}

/// Markers ordered by start time, stable for equal starts.
pub(crate) fn sorted(markers: &[Marker]) -> Vec<&Marker> {
    let mut sorted: Vec<&Marker> = markers.iter().collect();
    sorted.sort_by(|a, b| a.start_secs.total_cmp(&b.start_secs));
    sorted
}
