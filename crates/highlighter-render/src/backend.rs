//! The ffmpeg-based media backend.

use std::path::Path;

use crate::audio::{AudioMixer, AudioPlan};
use crate::ffmpeg::FfmpegPaths;
use crate::probe::{FfprobeProber, MediaInfo};
use crate::source::open_source;
use crate::writer::FfmpegFrameWriter;
use crate::{
    AudioRenderer, FrameSink, FrameSource, MediaBackend, Prober, RenderResult, SourceConfig,
    WriterConfig,
};

/// Probes, decodes, mixes and encodes with the ffmpeg binaries.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    paths: FfmpegPaths,
    prober: FfprobeProber,
    mixer: AudioMixer,
}

impl FfmpegBackend {
    pub fn new(paths: FfmpegPaths) -> Self {
        Self {
            prober: FfprobeProber::new(paths.clone()),
            mixer: AudioMixer::new(paths.clone()),
            paths,
        }
    }

    /// Binaries in use.
    pub fn paths(&self) -> &FfmpegPaths {
        &self.paths
    }
}

impl Prober for FfmpegBackend {
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo> {
        self.prober.probe(path)
    }
}

impl AudioRenderer for FfmpegBackend {
    fn render_audio(&self, plan: &AudioPlan) -> RenderResult<()> {
        self.mixer.render_audio(plan)
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, config: &SourceConfig) -> RenderResult<Box<dyn FrameSource>> {
        open_source(&self.paths, config)
    }

    fn open_sink(&self, config: &WriterConfig) -> RenderResult<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegFrameWriter::spawn(&self.paths, config)?))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
