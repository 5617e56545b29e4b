//! Clip model.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use highlighter_ipc::{ClipInfo, ClipSource, InputEvent, InputKind};

/// Shortest footage a trimmed clip may keep, in seconds.
pub const MIN_CLIP_DURATION: f64 = 1.0;

/// Per-stream placement of a clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamClipInfo {
    /// Position within the stream collection.
    pub order_position: usize,

    /// Start of the clip within the original recording, if known.
    pub initial_start_time: Option<f64>,

    /// End of the clip within the original recording, if known.
    pub initial_end_time: Option<f64>,
}

/// Detection data attached to automatically created clips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiClipInfo {
    /// Inputs inside the clip, timestamps relative to the clip file start.
    pub inputs: Vec<InputEvent>,

    /// Highlight score.
    pub score: f64,
}

impl AiClipInfo {
    /// Most frequent highlight-worthy input kind, first seen wins ties.
    pub fn dominant_input(&self) -> Option<InputKind> {
        let mut counts: Vec<(InputKind, u32)> = Vec::new();
        for input in self.inputs.iter().filter(|i| i.kind.is_highlight()) {
            match counts.iter_mut().find(|(kind, _)| *kind == input.kind) {
                Some((_, count)) => *count += input.count,
                None => counts.push((input.kind, input.count)),
            }
        }

        let mut best: Option<(InputKind, u32)> = None;
        for (kind, count) in counts {
            if best.map_or(true, |(_, top)| count > top) {
                best = Some((kind, count));
            }
        }
        best.map(|(kind, _)| kind)
    }

    /// Short description such as `Kill x2, Victory`.
    pub fn summary(&self) -> String {
        let mut parts: Vec<(InputKind, u32)> = Vec::new();
        for input in self.inputs.iter().filter(|i| i.kind.is_highlight()) {
            match parts.iter_mut().find(|(kind, _)| *kind == input.kind) {
                Some((_, count)) => *count += input.count,
                None => parts.push((input.kind, input.count)),
            }
        }

        parts
            .into_iter()
            .map(|(kind, count)| {
                if count > 1 {
                    format!("{} x{}", kind.label(), count)
                } else {
                    kind.label().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A recorded clip and its edit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    /// Clip file, also the collection key.
    pub path: PathBuf,

    /// Where the clip came from.
    pub source: ClipSource,

    /// Duration has been probed.
    pub loaded: bool,

    /// Included in exports.
    pub enabled: bool,

    /// File is missing on disk.
    pub deleted: bool,

    /// Seconds cut from the start.
    pub start_trim: f64,

    /// Seconds cut from the end.
    pub end_trim: f64,

    /// Untrimmed duration in seconds.
    pub duration: Option<f64>,

    /// Position in the global clip list.
    pub global_order_position: usize,

    /// Placement per stream collection.
    #[serde(default)]
    pub stream_info: HashMap<String, StreamClipInfo>,

    /// Detection data for automatically created clips.
    #[serde(default)]
    pub ai_info: Option<AiClipInfo>,
}

impl Clip {
    /// New untrimmed, enabled, not yet loaded clip.
    pub fn new(path: impl Into<PathBuf>, source: ClipSource) -> Self {
        Self {
            path: path.into(),
            source,
            loaded: false,
            enabled: true,
            deleted: false,
            start_trim: 0.0,
            end_trim: 0.0,
            duration: None,
            global_order_position: 0,
            stream_info: HashMap::new(),
            ai_info: None,
        }
    }

    /// Duration left after trimming, if the duration is known.
    pub fn trimmed_duration(&self) -> Option<f64> {
        self.duration
            .map(|d| (d - self.start_trim - self.end_trim).max(0.0))
    }

    /// Whether the clip can go into an export.
    pub fn is_exportable(&self) -> bool {
        self.enabled
            && self.loaded
            && !self.deleted
            && self.trimmed_duration().is_some_and(|d| d > 0.0)
    }

    /// Order position within `stream_id`, or the global position.
    pub fn order_position(&self, stream_id: Option<&str>) -> Option<usize> {
        match stream_id {
            Some(id) => self.stream_info.get(id).map(|info| info.order_position),
            None => Some(self.global_order_position),
        }
    }

    /// Display title: detected inputs, else the file stem.
    pub fn title(&self) -> String {
        if let Some(summary) = self.ai_info.as_ref().map(AiClipInfo::summary) {
            if !summary.is_empty() {
                return summary;
            }
        }
        file_stem(&self.path)
    }

    /// UI view of this clip.
    pub fn to_info(&self, stream_id: Option<&str>) -> ClipInfo {
        ClipInfo {
            path: self.path.clone(),
            source: self.source,
            enabled: self.enabled,
            loaded: self.loaded,
            start_trim: self.start_trim,
            end_trim: self.end_trim,
            duration: self.duration,
            order_position: self.order_position(stream_id).unwrap_or_default(),
        }
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Validate trims against an optional duration.
pub(crate) fn trims_valid(start: f64, end: f64, duration: Option<f64>) -> bool {
    if !start.is_finite() || !end.is_finite() || start < 0.0 || end < 0.0 {
        return false;
    }
    match duration {
        Some(d) => d - start - end >= MIN_CLIP_DURATION,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ai_clip(inputs: Vec<InputEvent>) -> Clip {
        let mut clip = Clip::new("/rec/replay.mp4", ClipSource::AiClip);
        clip.ai_info = Some(AiClipInfo { inputs, score: 1.0 });
        clip
    }

    #[test]
    fn test_trimmed_duration() {
        let mut clip = Clip::new("a.mp4", ClipSource::Manual);
        assert_eq!(clip.trimmed_duration(), None);
        clip.duration = Some(20.0);
        clip.start_trim = 2.5;
        clip.end_trim = 4.0;
        assert_eq!(clip.trimmed_duration(), Some(13.5));
    }

    #[test]
    fn test_exportable_requires_loaded_and_enabled() {
        let mut clip = Clip::new("a.mp4", ClipSource::Manual);
        assert!(!clip.is_exportable());
        clip.duration = Some(10.0);
        clip.loaded = true;
        assert!(clip.is_exportable());
        clip.enabled = false;
        assert!(!clip.is_exportable());
    }

    #[test]
    fn test_title_from_inputs() {
        let clip = ai_clip(vec![
            InputEvent::new(InputKind::Kill, 1.0),
            InputEvent::new(InputKind::Deploy, 2.0),
            InputEvent::new(InputKind::Kill, 3.0),
            InputEvent::new(InputKind::Victory, 4.0),
        ]);
        assert_eq!(clip.title(), "Kill x2, Victory");
        assert_eq!(
            clip.ai_info.as_ref().unwrap().dominant_input(),
            Some(InputKind::Kill)
        );
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let clip = ai_clip(vec![InputEvent::new(InputKind::StartGame, 0.0)]);
        assert_eq!(clip.title(), "replay");
    }

    #[test]
    fn test_trims_valid() {
        assert!(trims_valid(1.0, 1.0, Some(3.0)));
        assert!(!trims_valid(1.0, 1.5, Some(3.0)));
        assert!(!trims_valid(-0.1, 0.0, None));
        assert!(trims_valid(100.0, 0.0, None));
    }
}
