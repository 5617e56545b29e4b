//! Main engine orchestrator.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use highlighter_clips::{Clip, ClipCollection, ClipLibrary, HighlightedStream, StreamState};
use highlighter_ipc::{
    ClipSource, ExportPhase, ExportSettings, HighlighterCommand, HighlighterEvent,
    HighlighterState, MarkerFormat,
};
use highlighter_markers::write_markers;
use highlighter_realtime::{RealtimeAction, RealtimeConfig, RealtimeHighlighter, RealtimeInput};
use highlighter_render::{MediaBackend, STILL_DURATION_SECS};

use crate::error::EngineError;
use crate::plan::plan_export;
use crate::progress::ProgressTracker;
use crate::state::ExportResources;
use crate::EngineResult;

/// How long the command loop waits before ticking.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Defaults for marker export planning.
    pub export: ExportSettings,

    /// Realtime detection timing.
    pub realtime: RealtimeConfig,

    /// Wall seconds per recording second on the realtime clock.
    pub realtime_time_scale: f64,

    /// JSON clip library, loaded on start and saved on shutdown.
    pub library_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            export: ExportSettings::default(),
            realtime: RealtimeConfig::default(),
            realtime_time_scale: 1.0,
            library_path: None,
        }
    }
}

/// State and event plumbing shared with the export thread.
#[derive(Clone)]
struct Notifier {
    state: Arc<RwLock<HighlighterState>>,
    event_tx: Sender<HighlighterEvent>,
}

impl Notifier {
    fn transition_to(&self, new_state: HighlighterState) {
        let previous = {
            let mut state = self.state.write();
            let prev = state.clone();
            *state = new_state.clone();
            prev
        };

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.send_event(HighlighterEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(new_state),
        });
    }

    fn send_event(&self, event: HighlighterEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }

    fn send_error(&self, error: &EngineError) {
        self.send_event(HighlighterEvent::Error {
            recoverable: error.is_recoverable(),
            message: error.to_string(),
        });
    }
}

/// Recording clock for realtime detection.
struct RealtimeClock {
    started: Instant,
    time_scale: f64,
}

impl RealtimeClock {
    fn now(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if self.time_scale > 0.0 {
            elapsed / self.time_scale
        } else {
            elapsed
        }
    }
}

/// The highlighter engine.
pub struct Engine {
    command_rx: Receiver<HighlighterCommand>,
    notifier: Notifier,
    config: EngineConfig,
    backend: Arc<dyn MediaBackend>,
    clips: ClipCollection,
    library: Option<ClipLibrary>,
    realtime: RealtimeHighlighter,
    clock: Option<RealtimeClock>,
    progress: Arc<ProgressTracker>,
    export_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Create a new engine, loading the clip library if one is configured.
    pub fn new(
        command_rx: Receiver<HighlighterCommand>,
        event_tx: Sender<HighlighterEvent>,
        backend: Arc<dyn MediaBackend>,
        config: EngineConfig,
    ) -> Self {
        let library = config.library_path.clone().map(ClipLibrary::new);
        let clips = match library.as_ref().map(ClipLibrary::load) {
            Some(Ok(clips)) => clips,
            Some(Err(e)) => {
                warn!("Failed to load clip library, starting empty: {}", e);
                ClipCollection::new()
            }
            None => ClipCollection::new(),
        };

        Self {
            command_rx,
            notifier: Notifier {
                state: Arc::new(RwLock::new(HighlighterState::Idle)),
                event_tx,
            },
            realtime: RealtimeHighlighter::new(config.realtime.clone()),
            config,
            backend,
            clips,
            library,
            clock: None,
            progress: Arc::new(ProgressTracker::new()),
            export_thread: None,
        }
    }

    /// Current engine state.
    pub fn state(&self) -> HighlighterState {
        self.notifier.state.read().clone()
    }

    /// The clip collection.
    pub fn clips(&self) -> &ClipCollection {
        &self.clips
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!(backend = self.backend.name(), "Engine starting");
        self.notifier.send_event(HighlighterEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(TICK_INTERVAL) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => self.tick(),
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.shutdown();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if the engine should stop.
    pub fn handle_command(&mut self, command: HighlighterCommand) -> bool {
        debug!(?command, "Handling command");

        let result = match command {
            HighlighterCommand::AddClips {
                paths,
                stream_id,
                source,
            } => self.add_clips(&paths, stream_id, source),
            HighlighterCommand::RemoveClip { path } => self.edit_clips(None, |clips| {
                clips.remove_clip(&path).map(|_| ())
            }),
            HighlighterCommand::SetClipEnabled { path, enabled } => {
                self.edit_clips(None, |clips| clips.set_enabled(&path, enabled))
            }
            HighlighterCommand::TrimClip {
                path,
                start_trim,
                end_trim,
            } => self.edit_clips(None, |clips| clips.set_trim(&path, start_trim, end_trim)),
            HighlighterCommand::ReorderClips { stream_id, paths } => {
                let id = stream_id.clone();
                self.edit_clips(stream_id, |clips| clips.reorder(id.as_deref(), &paths))
            }
            HighlighterCommand::RemoveStream { stream_id } => {
                let id = stream_id.clone();
                self.edit_clips(Some(stream_id), |clips| clips.remove_stream(&id).map(|_| ()))
            }
            HighlighterCommand::Export {
                settings,
                stream_id,
            } => self.start_export(settings, stream_id.as_deref()),
            HighlighterCommand::CancelExport => {
                self.cancel_export();
                Ok(())
            }
            HighlighterCommand::ExportMarkers {
                format,
                stream_id,
                path,
                fps,
            } => self.export_markers(format, stream_id.as_deref(), &path, fps),
            HighlighterCommand::StartRealtime { stream_id } => self.start_realtime(stream_id),
            HighlighterCommand::StopRealtime => self.stop_realtime(),
            HighlighterCommand::VisionEvent(event) => {
                self.feed_realtime(RealtimeInput::Vision(event));
                Ok(())
            }
            HighlighterCommand::ReplayBufferSaved {
                path,
                end_time,
                duration,
            } => {
                self.feed_realtime(RealtimeInput::ReplayBufferReady {
                    path,
                    end_time,
                    duration,
                });
                Ok(())
            }
            HighlighterCommand::GetClips { stream_id } => {
                self.send_clips(stream_id);
                Ok(())
            }
            HighlighterCommand::GetState => {
                self.send_state();
                Ok(())
            }
            HighlighterCommand::SaveLibrary => self.save_library(),
            HighlighterCommand::Shutdown => {
                self.shutdown();
                self.notifier.send_event(HighlighterEvent::Shutdown);
                return false;
            }
        };

        if let Err(e) = result {
            warn!("Command failed: {}", e);
            self.notifier.send_error(&e);
        }
        true
    }

    /// Periodic work between commands.
    pub fn tick(&mut self) {
        self.reap_export();

        if self.notifier.state.read().is_exporting() && self.progress.has_new_frames() {
            self.notifier
                .send_event(HighlighterEvent::ExportProgress(self.progress.snapshot()));
            self.progress.mark_reported();
        }

        if let Some(now) = self.clock.as_ref().map(RealtimeClock::now) {
            self.feed_realtime(RealtimeInput::Tick(now));
        }
    }

    fn edit_clips<F>(&mut self, stream_id: Option<String>, edit: F) -> EngineResult<()>
    where
        F: FnOnce(&mut ClipCollection) -> highlighter_clips::ClipResult<()>,
    {
        edit(&mut self.clips)?;
        self.notifier
            .send_event(HighlighterEvent::ClipsChanged { stream_id });
        Ok(())
    }

    #[instrument(skip(self, paths), fields(count = paths.len()))]
    fn add_clips(
        &mut self,
        paths: &[PathBuf],
        stream_id: Option<String>,
        source: ClipSource,
    ) -> EngineResult<()> {
        let added = self.clips.add_clips(paths, stream_id.as_deref(), source);
        info!(added = added.len(), "Clips added");

        let mut first_error = None;
        for path in &added {
            if let Err(e) = self.load_clip(path) {
                warn!(path = %path.display(), "Failed to probe clip: {}", e);
                first_error.get_or_insert(e);
            }
        }

        self.notifier
            .send_event(HighlighterEvent::ClipsChanged { stream_id });
        first_error.map_or(Ok(()), Err)
    }

    /// Probe a clip and record its duration.
    fn load_clip(&mut self, path: &Path) -> EngineResult<()> {
        let duration = self
            .backend
            .probe_duration(path)?
            .unwrap_or(STILL_DURATION_SECS);
        self.clips.set_duration(path, duration)?;
        Ok(())
    }

    /// Start an export on a worker thread.
    #[instrument(name = "start_export", skip(self, settings))]
    fn start_export(&mut self, settings: ExportSettings, stream_id: Option<&str>) -> EngineResult<()> {
        self.reap_export();
        {
            let state = self.notifier.state.read();
            // Idempotent: ignore if already exporting
            if state.is_exporting() {
                debug!("Already exporting, ignoring export command");
                return Ok(());
            }
            if state.is_detecting() {
                return Err(EngineError::Busy("realtime detection is running"));
            }
        }

        let clips: Vec<Clip> = self
            .clips
            .enabled_clips(stream_id)
            .into_iter()
            .cloned()
            .collect();
        let plan = plan_export(self.backend.as_ref(), &clips, &settings)?;

        info!(
            output = %settings.file_path.display(),
            total_frames = plan.timeline.total_frames,
            "Starting export"
        );
        self.progress.start(plan.timeline.total_frames);
        self.notifier.transition_to(HighlighterState::Exporting {
            phase: ExportPhase::PrepareAudio,
        });

        let resources = ExportResources::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.progress),
            settings,
            plan,
        );
        let notifier = self.notifier.clone();
        let progress = Arc::clone(&self.progress);

        self.export_thread = Some(thread::spawn(move || {
            export_loop(resources, notifier, progress);
        }));
        Ok(())
    }

    fn cancel_export(&mut self) {
        if !self.notifier.state.read().is_exporting() {
            debug!("Not exporting, ignoring cancel");
            return;
        }
        info!("Cancelling export");
        self.progress.request_cancel();
    }

    /// Join a finished export thread.
    fn reap_export(&mut self) {
        if self
            .export_thread
            .as_ref()
            .is_some_and(JoinHandle::is_finished)
        {
            if let Some(handle) = self.export_thread.take() {
                if handle.join().is_err() {
                    error!("Export thread panicked");
                    self.notifier.transition_to(HighlighterState::Error {
                        message: "Export thread panicked".to_string(),
                        recoverable: true,
                    });
                }
            }
        }
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    fn export_markers(
        &mut self,
        format: MarkerFormat,
        stream_id: Option<&str>,
        path: &Path,
        fps: f64,
    ) -> EngineResult<()> {
        let clips: Vec<Clip> = self
            .clips
            .enabled_clips(stream_id)
            .into_iter()
            .cloned()
            .collect();
        let plan = plan_export(self.backend.as_ref(), &clips, &self.config.export)?;

        let title = stream_id
            .and_then(|id| self.clips.stream(id))
            .map(|s| s.title.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Highlights".to_string());

        write_markers(path, format, &title, &plan.markers(), fps)?;
        info!(markers = plan.timeline.entries.len(), "Markers exported");
        self.notifier.send_event(HighlighterEvent::MarkersExported {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn start_realtime(&mut self, stream_id: String) -> EngineResult<()> {
        if self.notifier.state.read().is_exporting() {
            return Err(EngineError::Busy("an export is running"));
        }
        self.realtime.start(Some(stream_id.clone()))?;

        if self.clips.stream(&stream_id).is_none() {
            self.clips.add_stream(HighlightedStream::new(&stream_id));
        }
        self.clips
            .set_stream_state(&stream_id, StreamState::Detecting)?;

        self.clock = Some(RealtimeClock {
            started: Instant::now(),
            time_scale: self.config.realtime_time_scale,
        });
        self.notifier.transition_to(HighlighterState::Detecting);
        Ok(())
    }

    fn stop_realtime(&mut self) -> EngineResult<()> {
        if !self.realtime.is_running() {
            debug!("Realtime detection not running, ignoring stop");
            return Ok(());
        }
        let discarded = self.realtime.stop()?;
        if discarded > 0 {
            warn!(discarded, "Stopped with highlights still waiting for a replay save");
        }
        if let Some(id) = self.realtime.stream_id().map(str::to_string) {
            self.clips.set_stream_state(&id, StreamState::Done)?;
        }
        self.clock = None;
        self.notifier.transition_to(HighlighterState::Idle);
        Ok(())
    }

    fn feed_realtime(&mut self, input: RealtimeInput) {
        for action in self.realtime.handle(input) {
            match action {
                RealtimeAction::SaveReplay => {
                    let now = self.realtime.now();
                    self.notifier
                        .send_event(HighlighterEvent::SaveReplayRequested { now });
                }
                RealtimeAction::ClipReady(clip) => self.add_highlight(clip),
                RealtimeAction::Dropped { reason } => warn!("Highlight dropped: {}", reason),
            }
        }
    }

    fn add_highlight(&mut self, clip: Clip) {
        let path = clip.path.clone();
        let stream_id = self.realtime.stream_id().map(str::to_string);

        match self.clips.add_clip(clip, stream_id.as_deref()) {
            Ok(()) => {
                info!(path = %path.display(), "Highlight clip added");
                self.notifier
                    .send_event(HighlighterEvent::HighlightClipAdded { path });
                self.notifier
                    .send_event(HighlighterEvent::ClipsChanged { stream_id });
            }
            Err(e) => {
                let e = EngineError::from(e);
                warn!("Failed to add highlight clip: {}", e);
                self.notifier.send_error(&e);
            }
        }
    }

    fn send_clips(&self, stream_id: Option<String>) {
        let clips = self
            .clips
            .clips(stream_id.as_deref())
            .into_iter()
            .map(|c| c.to_info(stream_id.as_deref()))
            .collect();
        self.notifier
            .send_event(HighlighterEvent::Clips { stream_id, clips });
    }

    fn send_state(&self) {
        let state = self.state();
        self.notifier.send_event(HighlighterEvent::StateChanged {
            previous: Box::new(state.clone()),
            current: Box::new(state),
        });
    }

    fn save_library(&self) -> EngineResult<()> {
        let library = self.library.as_ref().ok_or(EngineError::NoLibrary)?;
        library.save(&self.clips)?;
        info!(clips = self.clips.len(), "Library saved");
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.notifier.state.read().is_exporting() {
            self.progress.request_cancel();
        }
        if let Some(handle) = self.export_thread.take() {
            let _ = handle.join();
        }
        if self.realtime.is_running() {
            if let Err(e) = self.stop_realtime() {
                warn!("Failed to stop realtime detection: {}", e);
            }
        }
        if self.library.is_some() {
            if let Err(e) = self.save_library() {
                error!("Failed to save library on shutdown: {}", e);
            }
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.progress.request_cancel();
        if let Some(handle) = self.export_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Export worker.
fn export_loop(mut resources: ExportResources, notifier: Notifier, progress: Arc<ProgressTracker>) {
    debug!("Export loop starting");
    let started = Instant::now();

    let phase_notifier = notifier.clone();
    let result = resources.run(|phase| {
        phase_notifier.transition_to(HighlighterState::Exporting { phase });
    });

    match result {
        Ok(()) => {
            let path = resources.output().to_path_buf();
            notifier.send_event(HighlighterEvent::ExportProgress(progress.snapshot()));
            info!(
                elapsed_secs = started.elapsed().as_secs_f32(),
                fps = progress.frames_per_second(),
                "Export finished"
            );
            notifier.transition_to(HighlighterState::Idle);
            notifier.send_event(HighlighterEvent::ExportFinished { path });
        }
        Err(e) if e.is_cancelled() => {
            info!("Export cancelled");
            resources.rollback();
            notifier.transition_to(HighlighterState::Idle);
            notifier.send_event(HighlighterEvent::ExportCancelled);
        }
        Err(e) => {
            error!("Export failed: {}", e);
            resources.rollback();
            progress.fail(e.to_string());
            notifier.send_event(HighlighterEvent::ExportProgress(progress.snapshot()));
            notifier.transition_to(HighlighterState::Error {
                message: e.to_string(),
                recoverable: e.is_recoverable(),
            });
            notifier.send_error(&e);
        }
    }
}
