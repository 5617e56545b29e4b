//! Rendering highlight reels with ffmpeg.
//!
//! Clips are decoded to raw RGBA frames by one ffmpeg process per clip,
//! blended across transitions in Rust, and piped into an encoding ffmpeg
//! process together with a pre-mixed audio track.

mod audio;
mod backend;
mod error;
mod ffmpeg;
mod filters;
mod frame;
mod probe;
mod render;
mod source;
mod subtitle;
mod timeline;
mod transition;
mod writer;

pub use audio::{AudioMixer, AudioPlan, AudioSegment, MusicTrack};
pub use backend::FfmpegBackend;
pub use error::RenderError;
pub use ffmpeg::{find_in_path, FfmpegPaths};
pub use filters::{escape_filter_value, fit_chain, FilterChain};
pub use frame::{Frame, RGBA_BYTES_PER_PIXEL};
pub use probe::{parse_probe_output, probe_media, FfprobeProber, MediaInfo};
pub use render::Renderer;
pub use source::{decode_still, FfmpegFrameSource, StillFrameSource};
pub use subtitle::{SubtitleCue, SubtitleTrack};
pub use timeline::{plan_timeline, Timeline, TimelineClip, TimelineEntry, STILL_DURATION_SECS};
pub use transition::blend;
pub use writer::FfmpegFrameWriter;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use highlighter_ipc::{Orientation, Preset};

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Audio sample rate of the mixed track.
pub const AUDIO_SAMPLE_RATE: u32 = 48_000;

/// Length of the fade to black at the end of an export.
pub const FADE_OUT_SECS: f64 = 1.0;

/// Decoding configuration for one timeline entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Media file.
    pub path: PathBuf,

    /// Seconds skipped at the start of the file.
    pub start_secs: f64,

    /// Seconds to decode.
    pub duration_secs: f64,

    /// Frames the renderer will pull.
    pub frame_count: u64,

    /// Output width in pixels.
    pub width: u32,

    /// Output height in pixels.
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// How the clip is fitted into the frame.
    pub orientation: Orientation,

    /// Decode a single image and repeat it.
    pub is_still: bool,
}

/// Encoding configuration for the output file.
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Destination file.
    pub output: PathBuf,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Frame rate.
    pub fps: u32,

    /// Encoder preset.
    pub preset: Preset,

    /// Frames that will be written.
    pub total_frames: u64,

    /// Pre-mixed audio track.
    pub audio: Option<PathBuf>,

    /// SRT file burned into the video.
    pub subtitles: Option<PathBuf>,
}

impl WriterConfig {
    /// Output length in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.fps == 0 {
            0.0
        } else {
            self.total_frames as f64 / self.fps as f64
        }
    }
}

/// Something that yields decoded frames of one clip.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the clip is exhausted.
    fn next_frame(&mut self) -> RenderResult<Option<Frame>>;

    /// Frames this source is expected to yield.
    fn frame_count(&self) -> u64;

    /// Frame dimensions.
    fn dimensions(&self) -> (u32, u32);
}

/// Something that consumes rendered frames.
pub trait FrameSink: Send {
    /// Write one frame.
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()>;

    /// Frames written so far.
    fn frames_written(&self) -> u64;

    /// Flush and close the output.
    fn finish(self: Box<Self>) -> RenderResult<()>;

    /// Stop without producing a complete file.
    fn abort(self: Box<Self>);
}

/// Reads media metadata.
pub trait Prober: Send + Sync {
    /// Probe a media file.
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo>;

    /// Duration in seconds; `None` for still images.
    fn probe_duration(&self, path: &Path) -> RenderResult<Option<f64>> {
        Ok(self.probe(path)?.duration)
    }
}

/// Produces the export's audio track.
pub trait AudioRenderer: Send + Sync {
    /// Mix `plan` into its output file.
    fn render_audio(&self, plan: &AudioPlan) -> RenderResult<()>;
}

/// Everything an export needs from the media toolchain.
pub trait MediaBackend: Prober + AudioRenderer {
    /// Start decoding a clip.
    fn open_source(&self, config: &SourceConfig) -> RenderResult<Box<dyn FrameSource>>;

    /// Start encoding the output.
    fn open_sink(&self, config: &WriterConfig) -> RenderResult<Box<dyn FrameSink>>;

    /// Backend name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the ffmpeg backend, discovering the binaries unless given.
pub fn create_backend(paths: Option<FfmpegPaths>) -> RenderResult<Arc<dyn MediaBackend>> {
    let paths = match paths {
        Some(paths) => paths,
        None => FfmpegPaths::discover()?,
    };
    info!(ffmpeg = %paths.ffmpeg.display(), "Using ffmpeg backend");
    Ok(Arc::new(FfmpegBackend::new(paths)))
}
