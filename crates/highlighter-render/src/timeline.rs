//! Placement of clips on the output timeline.
//!
//! Consecutive clips overlap by the transition length. Every overlap is
//! clamped to half of the shorter neighbour so that a clip's incoming and
//! outgoing transitions never meet.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use highlighter_ipc::TransitionSettings;

use crate::error::RenderError;
use crate::RenderResult;

/// Seconds a still image (splash or outro card) stays on screen.
pub const STILL_DURATION_SECS: f64 = 3.0;

/// A clip as handed to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineClip {
    /// Media file.
    pub path: PathBuf,

    /// Display title, used for markers.
    pub title: String,

    /// Seconds skipped at the start of the file.
    pub start_trim: f64,

    /// Seconds to play after the trim.
    pub duration: f64,

    /// File has an audio stream.
    pub has_audio: bool,

    /// File is a still image shown for [`STILL_DURATION_SECS`].
    pub is_still: bool,
}

impl TimelineClip {
    /// Still image card.
    pub fn still(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
            start_trim: 0.0,
            duration: STILL_DURATION_SECS,
            has_audio: false,
            is_still: true,
        }
    }
}

/// A clip placed on the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// The clip.
    pub clip: TimelineClip,

    /// Frames this clip contributes, including transition overlaps.
    pub frames: u64,

    /// First output frame showing this clip.
    pub start_frame: u64,

    /// Frames shared with the previous clip.
    pub transition_in_frames: u64,
}

impl TimelineEntry {
    /// Overlap with the previous clip in seconds at `fps`.
    pub fn transition_in_secs(&self, fps: u32) -> f64 {
        self.transition_in_frames as f64 / fps as f64
    }

    /// Clip length in seconds at `fps`.
    pub fn duration_secs(&self, fps: u32) -> f64 {
        self.frames as f64 / fps as f64
    }
}

/// The full output plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Entries in playback order.
    pub entries: Vec<TimelineEntry>,

    /// Output frame rate.
    pub fps: u32,

    /// Frames in the output.
    pub total_frames: u64,
}

impl Timeline {
    /// Output length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / self.fps as f64
    }

    /// Overlap between entry `index` and the next one.
    pub fn transition_out_frames(&self, index: usize) -> u64 {
        self.entries
            .get(index + 1)
            .map_or(0, |next| next.transition_in_frames)
    }
}

/// Lay out `clips` at `fps` with `transition` overlaps.
///
/// Clips shorter than one frame are skipped.
pub fn plan_timeline(
    clips: &[TimelineClip],
    fps: u32,
    transition: &TransitionSettings,
) -> RenderResult<Timeline> {
    if fps == 0 {
        return Err(RenderError::Source("frame rate must be positive".to_string()));
    }

    let overlap = (transition.overlap_secs() * fps as f64).round() as u64;
    let mut entries: Vec<TimelineEntry> = Vec::with_capacity(clips.len());

    for clip in clips {
        let frames = if clip.duration.is_finite() && clip.duration > 0.0 {
            (clip.duration * fps as f64).round() as u64
        } else {
            0
        };
        if frames == 0 {
            warn!(path = %clip.path.display(), "Skipping clip shorter than one frame");
            continue;
        }

        let (start_frame, transition_in_frames) = match entries.last() {
            None => (0, 0),
            Some(previous) => {
                let t = overlap.min(previous.frames / 2).min(frames / 2);
                (previous.start_frame + previous.frames - t, t)
            }
        };

        entries.push(TimelineEntry {
            clip: clip.clone(),
            frames,
            start_frame,
            transition_in_frames,
        });
    }

    let total_frames = entries
        .last()
        .map(|e| e.start_frame + e.frames)
        .ok_or(RenderError::NoClips)?;

    debug!(entries = entries.len(), total_frames, fps, "Timeline planned");
    Ok(Timeline {
        entries,
        fps,
        total_frames,
    })
}
