//! Turning a clip collection into a render timeline and markers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use highlighter_clips::Clip;
use highlighter_ipc::{ExportSettings, InputKind};
use highlighter_markers::{Marker, MarkerColor};
use highlighter_render::{plan_timeline, Prober, Timeline, TimelineClip, STILL_DURATION_SECS};

use crate::error::EngineError;
use crate::EngineResult;

const INTRO_TITLE: &str = "Intro";
const OUTRO_TITLE: &str = "Outro";

/// A timeline plus what the markers need to know about it.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// The planned output.
    pub timeline: Timeline,

    /// Seconds before the first highlight (the intro, minus its overlap).
    pub content_offset_secs: f64,

    inputs: HashMap<PathBuf, InputKind>,
}

impl ExportPlan {
    /// One marker per timeline entry, coloured by its dominant input.
    pub fn markers(&self) -> Vec<Marker> {
        let fps = f64::from(self.timeline.fps);
        self.timeline
            .entries
            .iter()
            .map(|entry| {
                let color = self
                    .inputs
                    .get(&entry.clip.path)
                    .map_or(MarkerColor::Blue, |kind| MarkerColor::for_input(*kind));
                let mut marker = Marker::new(entry.clip.title.clone(), entry.start_frame as f64 / fps)
                    .with_duration(entry.frames as f64 / fps)
                    .with_color(color);
                marker.description = entry.clip.path.display().to_string();
                marker
            })
            .collect()
    }
}

/// Plan the export of `clips` (already in order) with `settings`.
///
/// Every file is probed so still images and clips without audio are
/// handled correctly.
#[instrument(skip_all, fields(clips = clips.len()))]
pub fn plan_export(
    prober: &dyn Prober,
    clips: &[Clip],
    settings: &ExportSettings,
) -> EngineResult<ExportPlan> {
    let exportable: Vec<&Clip> = clips.iter().filter(|c| c.is_exportable()).collect();
    if exportable.is_empty() {
        return Err(EngineError::NoClips);
    }

    let mut timeline_clips = Vec::with_capacity(exportable.len() + 2);
    let mut inputs = HashMap::new();

    if let Some(intro) = &settings.intro_path {
        timeline_clips.push(bookend(prober, intro, INTRO_TITLE)?);
    }

    for clip in &exportable {
        let info = prober.probe(&clip.path)?;
        let duration = match (info.is_still, clip.trimmed_duration()) {
            (true, _) => STILL_DURATION_SECS,
            (false, Some(duration)) => duration,
            (false, None) => continue,
        };
        if let Some(kind) = clip.ai_info.as_ref().and_then(|ai| ai.dominant_input()) {
            inputs.insert(clip.path.clone(), kind);
        }
        timeline_clips.push(TimelineClip {
            path: clip.path.clone(),
            title: clip.title(),
            start_trim: if info.is_still { 0.0 } else { clip.start_trim },
            duration,
            has_audio: info.has_audio,
            is_still: info.is_still,
        });
    }

    if let Some(outro) = &settings.outro_path {
        timeline_clips.push(bookend(prober, outro, OUTRO_TITLE)?);
    }

    let timeline = plan_timeline(&timeline_clips, settings.fps.value(), &settings.transition)?;
    let content_offset_secs = match (&settings.intro_path, timeline.entries.get(1)) {
        (Some(_), Some(first_clip)) => first_clip.start_frame as f64 / f64::from(timeline.fps),
        _ => 0.0,
    };

    debug!(
        entries = timeline.entries.len(),
        total_frames = timeline.total_frames,
        content_offset_secs,
        "Export planned"
    );
    Ok(ExportPlan {
        timeline,
        content_offset_secs,
        inputs,
    })
}

/// An intro or outro played in full.
fn bookend(prober: &dyn Prober, path: &Path, title: &str) -> EngineResult<TimelineClip> {
    let info = prober.probe(path)?;
    if info.is_still {
        return Ok(TimelineClip::still(path, title));
    }
    Ok(TimelineClip {
        path: path.to_path_buf(),
        title: title.to_string(),
        start_trim: 0.0,
        duration: info.duration.unwrap_or(STILL_DURATION_SECS),
        has_audio: info.has_audio,
        is_still: false,
    })
}
