//! Export resources and phase tracking.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use highlighter_ipc::{ExportPhase, ExportSettings, ExportStep};
use highlighter_render::{
    AudioPlan, FrameSink, MediaBackend, RenderError, Renderer, SourceConfig, SubtitleTrack,
    WriterConfig,
};

use crate::error::EngineError;
use crate::plan::ExportPlan;
use crate::progress::ProgressTracker;
use crate::EngineResult;

/// Everything an export has created so far.
#[derive(Default)]
pub struct ExportArtifacts {
    /// Mixed audio track.
    pub audio: Option<PathBuf>,

    /// Shifted subtitles.
    pub subtitles: Option<PathBuf>,

    /// Running encoder.
    pub sink: Option<Box<dyn FrameSink>>,

    /// The encoder has started writing the output file.
    pub output_started: bool,
}

/// Runs an export through its phases and undoes them on failure.
pub struct ExportResources {
    backend: Arc<dyn MediaBackend>,
    progress: Arc<ProgressTracker>,
    settings: ExportSettings,
    plan: ExportPlan,
    artifacts: ExportArtifacts,
    current_phase: Option<ExportPhase>,
    completed: bool,
}

impl ExportResources {
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        progress: Arc<ProgressTracker>,
        settings: ExportSettings,
        plan: ExportPlan,
    ) -> Self {
        Self {
            backend,
            progress,
            settings,
            plan,
            artifacts: ExportArtifacts::default(),
            current_phase: None,
            completed: false,
        }
    }

    /// Run every phase in order. `on_phase` is called as each one starts.
    ///
    /// On error the caller is expected to [`rollback`](Self::rollback).
    #[instrument(name = "run_export", skip_all, fields(output = %self.settings.file_path.display()))]
    pub fn run(&mut self, mut on_phase: impl FnMut(ExportPhase)) -> EngineResult<()> {
        let mut phase = ExportPhase::PrepareAudio;

        loop {
            self.current_phase = Some(phase);
            on_phase(phase);
            self.run_phase(phase)?;

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        self.completed = true;
        self.remove_temporary_files();
        info!(output = %self.settings.file_path.display(), "Export complete");
        Ok(())
    }

    fn run_phase(&mut self, phase: ExportPhase) -> EngineResult<()> {
        debug!(phase = phase.name(), "Export phase");
        if self.progress.is_cancel_requested() {
            return Err(RenderError::Cancelled.into());
        }

        match phase {
            ExportPhase::PrepareAudio => self.prepare_audio(),
            ExportPhase::OpenWriter => self.open_writer(),
            ExportPhase::RenderFrames => self.render_frames(),
            ExportPhase::Finalize => self.finalize(),
        }
    }

    fn prepare_audio(&mut self) -> EngineResult<()> {
        self.progress.set_step(ExportStep::AudioMix);
        let output = &self.settings.file_path;
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        if let Some(path) = &self.settings.subtitles_path {
            let track = SubtitleTrack::read_srt(path)?.shifted(self.plan.content_offset_secs);
            let shifted = sidecar_path(output, "subtitles.srt");
            self.artifacts.subtitles = Some(shifted.clone());
            track.write_srt(&shifted)?;
        }

        let plan = AudioPlan::from_timeline(
            &self.plan.timeline,
            &self.settings.music,
            sidecar_path(output, "audio.flac"),
        );
        if plan.segments.iter().any(|s| s.has_audio) || plan.music.is_some() {
            self.artifacts.audio = Some(plan.output.clone());
            self.backend.render_audio(&plan)?;
        } else {
            debug!("No audio in any clip, exporting silent video");
        }
        Ok(())
    }

    fn open_writer(&mut self) -> EngineResult<()> {
        let (width, height) = self.settings.dimensions();
        let config = WriterConfig {
            output: self.settings.file_path.clone(),
            width,
            height,
            fps: self.plan.timeline.fps,
            preset: self.settings.preset,
            total_frames: self.plan.timeline.total_frames,
            audio: self.artifacts.audio.clone(),
            subtitles: self.artifacts.subtitles.clone(),
        };
        let sink = self.backend.open_sink(&config)?;
        self.artifacts.output_started = true;
        self.artifacts.sink = Some(sink);
        Ok(())
    }

    fn render_frames(&mut self) -> EngineResult<()> {
        self.progress.set_step(ExportStep::Frames);
        self.progress.set_total_frames(self.plan.timeline.total_frames);

        let sink = self
            .artifacts
            .sink
            .as_deref_mut()
            .ok_or(EngineError::Busy("encoder not open"))?;
        let dimensions = self.settings.dimensions();
        let timeline = &self.plan.timeline;
        let orientation = self.settings.orientation;
        let backend = &self.backend;
        let progress = &self.progress;

        let renderer = Renderer::new(
            timeline,
            self.settings.transition.kind,
            dimensions,
            progress.cancel_flag(),
        );
        renderer.render(
            |entry| {
                backend.open_source(&SourceConfig {
                    path: entry.clip.path.clone(),
                    start_secs: entry.clip.start_trim,
                    duration_secs: entry.duration_secs(timeline.fps),
                    frame_count: entry.frames,
                    width: dimensions.0,
                    height: dimensions.1,
                    fps: timeline.fps,
                    orientation,
                    is_still: entry.clip.is_still,
                })
            },
            sink,
            |written| progress.record_frames(written),
        )?;
        Ok(())
    }

    fn finalize(&mut self) -> EngineResult<()> {
        if let Some(sink) = self.artifacts.sink.take() {
            sink.finish()?;
        }
        Ok(())
    }

    /// Undo phases from the current one backwards.
    #[instrument(name = "rollback_export", skip(self))]
    pub fn rollback(&mut self) {
        let Some(mut phase) = self.current_phase.take() else {
            return;
        };

        loop {
            debug!(phase = phase.name(), "Rolling back phase");
            self.rollback_phase(phase);

            match phase.previous() {
                Some(previous) => phase = previous,
                None => break,
            }
        }
    }

    fn rollback_phase(&mut self, phase: ExportPhase) {
        match phase {
            ExportPhase::Finalize | ExportPhase::RenderFrames => {
                // Nothing beyond what the writer phase owns.
            }
            ExportPhase::OpenWriter => {
                if let Some(sink) = self.artifacts.sink.take() {
                    sink.abort();
                }
                if std::mem::take(&mut self.artifacts.output_started) {
                    remove_file(&self.settings.file_path);
                }
            }
            ExportPhase::PrepareAudio => self.remove_temporary_files(),
        }
    }

    fn remove_temporary_files(&mut self) {
        if let Some(path) = self.artifacts.audio.take() {
            remove_file(&path);
        }
        if let Some(path) = self.artifacts.subtitles.take() {
            remove_file(&path);
        }
    }

    /// Destination file.
    pub fn output(&self) -> &Path {
        &self.settings.file_path
    }

    /// Temporary and output files created so far.
    pub fn artifacts(&self) -> &ExportArtifacts {
        &self.artifacts
    }
}

impl Drop for ExportResources {
    fn drop(&mut self) {
        if !self.completed {
            self.rollback();
        }
    }
}

/// `<dir>/.<stem>.<suffix>` next to the output.
fn sidecar_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    output.with_file_name(format!(".{stem}.{suffix}"))
}

fn remove_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}
