//! Mixing the export's audio track in one ffmpeg pass.
//!
//! Every clip's audio is trimmed to exactly its timeline length (silence
//! fills clips without audio), consecutive clips are joined with
//! `acrossfade` over their transition overlap or plain `concat`, and the
//! optional background music is looped underneath with `amix`.

use std::ffi::OsString;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;

use tracing::{debug, info, instrument};

use highlighter_ipc::MusicSettings;

use crate::error::RenderError;
use crate::ffmpeg::{check_status, display_args, seconds_arg, FfmpegPaths};
use crate::timeline::Timeline;
use crate::{AudioRenderer, RenderResult, AUDIO_SAMPLE_RATE};

/// Audio of one timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Media file.
    pub path: PathBuf,

    /// Seconds skipped at the start of the file.
    pub start_secs: f64,

    /// Seconds on the timeline.
    pub duration_secs: f64,

    /// Overlap with the previous segment.
    pub crossfade_secs: f64,

    /// `false` when the file has no audio stream and silence is used.
    pub has_audio: bool,
}

/// Background music mixed under the clips.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicTrack {
    /// Music file, looped as needed.
    pub path: PathBuf,

    /// Volume (0 - 100).
    pub volume: u8,
}

/// Everything needed to produce the audio track.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPlan {
    /// Segments in playback order.
    pub segments: Vec<AudioSegment>,

    /// Optional background music.
    pub music: Option<MusicTrack>,

    /// Total length in seconds.
    pub total_secs: f64,

    /// FLAC file to write.
    pub output: PathBuf,
}

impl AudioPlan {
    /// Build the plan matching a rendered timeline.
    pub fn from_timeline(timeline: &Timeline, music: &MusicSettings, output: PathBuf) -> Self {
        let segments = timeline
            .entries
            .iter()
            .map(|entry| AudioSegment {
                path: entry.clip.path.clone(),
                start_secs: entry.clip.start_trim,
                duration_secs: entry.duration_secs(timeline.fps),
                crossfade_secs: entry.transition_in_secs(timeline.fps),
                has_audio: entry.clip.has_audio && !entry.clip.is_still,
            })
            .collect();

        let music = match (&music.path, music.enabled) {
            (Some(path), true) if music.volume > 0 => Some(MusicTrack {
                path: path.clone(),
                volume: music.volume.min(100),
            }),
            _ => None,
        };

        Self {
            segments,
            music,
            total_secs: timeline.duration_secs(),
            output,
        }
    }

    /// ffmpeg arguments after the global options.
    pub fn args(&self) -> RenderResult<Vec<OsString>> {
        if self.segments.is_empty() {
            return Err(RenderError::NoClips);
        }

        let mut args: Vec<OsString> = Vec::new();
        for segment in &self.segments {
            let duration = seconds_arg(segment.duration_secs);
            if segment.has_audio {
                args.push("-ss".into());
                args.push(seconds_arg(segment.start_secs).into());
                args.push("-t".into());
                args.push(duration.into());
                args.push("-i".into());
                args.push(segment.path.clone().into_os_string());
            } else {
                args.extend(["-f", "lavfi", "-t"].map(OsString::from));
                args.push(duration.into());
                args.push("-i".into());
                args.push(
                    format!("anullsrc=channel_layout=stereo:sample_rate={AUDIO_SAMPLE_RATE}")
                        .into(),
                );
            }
        }
        if let Some(music) = &self.music {
            args.extend(["-stream_loop", "-1", "-i"].map(OsString::from));
            args.push(music.path.clone().into_os_string());
        }

        args.push("-filter_complex".into());
        args.push(self.filter_graph().into());
        args.extend(["-map", "[out]", "-t"].map(OsString::from));
        args.push(seconds_arg(self.total_secs).into());
        args.extend(["-c:a", "flac", "-y"].map(OsString::from));
        args.push(self.output.clone().into_os_string());
        Ok(args)
    }

    /// The `-filter_complex` graph, ending in the `[out]` pad.
    pub fn filter_graph(&self) -> String {
        let format = format!(
            "aformat=sample_rates={AUDIO_SAMPLE_RATE}:channel_layouts=stereo"
        );
        let mut graph = String::new();

        for (i, segment) in self.segments.iter().enumerate() {
            let _ = write!(
                graph,
                "[{i}:a]{format},apad,atrim=duration={},asetpts=N/SR/TB[a{i}];",
                seconds_arg(segment.duration_secs)
            );
        }

        let mut current = "a0".to_string();
        for (i, segment) in self.segments.iter().enumerate().skip(1) {
            let joined = format!("j{i}");
            if segment.crossfade_secs > 0.0 {
                let _ = write!(
                    graph,
                    "[{current}][a{i}]acrossfade=d={}:c1=tri:c2=tri[{joined}];",
                    seconds_arg(segment.crossfade_secs)
                );
            } else {
                let _ = write!(graph, "[{current}][a{i}]concat=n=2:v=0:a=1[{joined}];");
            }
            current = joined;
        }

        match &self.music {
            Some(music) => {
                let m = self.segments.len();
                let _ = write!(
                    graph,
                    "[{m}:a]{format},volume={:.2}[music];\
                     [{current}][music]amix=inputs=2:duration=first:normalize=0[out]",
                    f64::from(music.volume) / 100.0
                );
            }
            None => {
                let _ = write!(graph, "[{current}]anull[out]");
            }
        }
        graph
    }
}

/// [`AudioRenderer`] running ffmpeg.
#[derive(Debug, Clone)]
pub struct AudioMixer {
    paths: FfmpegPaths,
}

impl AudioMixer {
    pub fn new(paths: FfmpegPaths) -> Self {
        Self { paths }
    }
}

impl AudioRenderer for AudioMixer {
    #[instrument(skip(self, plan), fields(output = %plan.output.display(), segments = plan.segments.len()))]
    fn render_audio(&self, plan: &AudioPlan) -> RenderResult<()> {
        let args = plan.args()?;
        debug!(args = %display_args(&args), "Mixing audio");

        let output = self
            .paths
            .ffmpeg_command()
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RenderError::Ffmpeg(format!("Failed to spawn audio mixer: {e}")))?;

        check_status(
            output.status,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )?;
        info!(secs = plan.total_secs, "Audio mixed");
        Ok(())
    }
}
