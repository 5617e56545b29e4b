//! Common types used across IPC messages.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where a clip came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipSource {
    /// Saved from the replay buffer by the user.
    ReplayBuffer,

    /// Imported manually from disk.
    Manual,

    /// Saved automatically from a detected highlight.
    AiClip,
}

/// Output orientation of the rendered video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Landscape 16:9.
    #[default]
    Horizontal,

    /// Portrait 9:16, center cropped.
    Vertical,
}

/// Output resolution, named by its short edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720")]
    R720,
    #[default]
    #[serde(rename = "1080")]
    R1080,
    #[serde(rename = "1440")]
    R1440,
    #[serde(rename = "2160")]
    R2160,
}

impl Resolution {
    /// Width and height of a landscape frame at this resolution.
    pub fn landscape_dimensions(self) -> (u32, u32) {
        match self {
            Self::R720 => (1280, 720),
            Self::R1080 => (1920, 1080),
            Self::R1440 => (2560, 1440),
            Self::R2160 => (3840, 2160),
        }
    }

    /// Width and height for the given orientation.
    pub fn dimensions(self, orientation: Orientation) -> (u32, u32) {
        let (w, h) = self.landscape_dimensions();
        match orientation {
            Orientation::Horizontal => (w, h),
            Orientation::Vertical => (h, w),
        }
    }
}

/// Output frame rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fps {
    #[default]
    #[serde(rename = "30")]
    F30,
    #[serde(rename = "60")]
    F60,
}

impl Fps {
    /// Frames per second as an integer.
    pub fn value(self) -> u32 {
        match self {
            Self::F30 => 30,
            Self::F60 => 60,
        }
    }
}

/// Encoder speed/quality trade-off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Ultrafast,
    #[default]
    Fast,
    Slow,
}

impl Preset {
    /// x264 preset name.
    pub fn x264_preset(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Fast => "fast",
            Self::Slow => "slow",
        }
    }

    /// Constant rate factor used with this preset.
    pub fn crf(self) -> u32 {
        match self {
            Self::Ultrafast => 26,
            Self::Fast => 21,
            Self::Slow => 18,
        }
    }
}

/// Transition style between consecutive clips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Hard cut.
    None,

    /// Linear crossfade.
    #[default]
    Fade,

    /// Fade out to black, then in from black.
    FadeBlack,

    /// The next clip wipes in from the right edge.
    WipeLeft,
}

/// Transition configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionSettings {
    /// Transition style.
    pub kind: TransitionKind,

    /// Transition length in seconds.
    pub duration_secs: f64,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            kind: TransitionKind::Fade,
            duration_secs: 1.0,
        }
    }
}

impl TransitionSettings {
    /// Effective overlap in seconds (zero for hard cuts).
    pub fn overlap_secs(&self) -> f64 {
        if self.kind == TransitionKind::None {
            0.0
        } else {
            self.duration_secs.max(0.0)
        }
    }
}

/// Background music configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicSettings {
    /// Whether music is mixed in.
    pub enabled: bool,

    /// Music file.
    pub path: Option<PathBuf>,

    /// Music volume (0 - 100).
    pub volume: u8,
}

impl Default for MusicSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            volume: 50,
        }
    }
}

/// Configuration for a video export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Destination file.
    pub file_path: PathBuf,

    /// Output resolution.
    pub resolution: Resolution,

    /// Output frame rate.
    pub fps: Fps,

    /// Encoder preset.
    pub preset: Preset,

    /// Output orientation.
    pub orientation: Orientation,

    /// Transition between clips.
    pub transition: TransitionSettings,

    /// Background music.
    pub music: MusicSettings,

    /// Optional clip played before the highlights.
    pub intro_path: Option<PathBuf>,

    /// Optional clip played after the highlights.
    pub outro_path: Option<PathBuf>,

    /// Optional SRT file burned into the output.
    pub subtitles_path: Option<PathBuf>,
}

impl ExportSettings {
    /// Output frame dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        self.resolution.dimensions(self.orientation)
    }
}

/// Marker metadata format for third-party editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerFormat {
    /// CMX3600-style marker EDL.
    Edl,

    /// Marker CSV.
    Csv,

    /// YouTube chapter list.
    YoutubeChapters,
}

impl MarkerFormat {
    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Edl => "edl",
            Self::Csv => "csv",
            Self::YoutubeChapters => "txt",
        }
    }
}

/// Kinds of detected gameplay input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Kill,
    Knocked,
    Death,
    Victory,
    Defeat,
    Elimination,
    Deploy,
    PlayerKnocked,
    BestKill,
    StartGame,
    EndGame,
}

impl InputKind {
    /// Whether this input can anchor a highlight on its own.
    pub fn is_highlight(self) -> bool {
        !matches!(self, Self::StartGame | Self::EndGame | Self::Deploy)
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Kill => "Kill",
            Self::Knocked => "Knock",
            Self::Death => "Death",
            Self::Victory => "Victory",
            Self::Defeat => "Defeat",
            Self::Elimination => "Elimination",
            Self::Deploy => "Deploy",
            Self::PlayerKnocked => "Knocked",
            Self::BestKill => "Best kill",
            Self::StartGame => "Game start",
            Self::EndGame => "Game end",
        }
    }
}

/// A detected gameplay input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Kind of input.
    pub kind: InputKind,

    /// Seconds since recording start.
    pub timestamp_secs: f64,

    /// Number of occurrences folded into this event.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl InputEvent {
    /// Create a single occurrence event.
    pub fn new(kind: InputKind, timestamp_secs: f64) -> Self {
        Self {
            kind,
            timestamp_secs,
            count: 1,
        }
    }
}

/// UI view of a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipInfo {
    /// Clip file.
    pub path: PathBuf,

    /// Where the clip came from.
    pub source: ClipSource,

    /// Included in exports.
    pub enabled: bool,

    /// Duration has been probed.
    pub loaded: bool,

    /// Seconds cut from the start.
    pub start_trim: f64,

    /// Seconds cut from the end.
    pub end_trim: f64,

    /// Untrimmed duration in seconds, if known.
    pub duration: Option<f64>,

    /// Position in the requested ordering.
    pub order_position: usize,
}

/// Export step currently running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportStep {
    /// Mixing the audio track.
    #[default]
    AudioMix,

    /// Rendering video frames.
    Frames,
}

/// Export progress report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Current step.
    pub step: ExportStep,

    /// Frames in the final video.
    pub total_frames: u64,

    /// Frames written so far.
    pub current_frame: u64,

    /// A cancel has been requested.
    pub cancel_requested: bool,

    /// Error text, if the export failed.
    pub error: Option<String>,
}

impl ExportProgress {
    /// Completion percentage (0 - 100).
    pub fn percent(&self) -> f32 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.current_frame as f32 / self.total_frames as f32 * 100.0).min(100.0)
    }
}
