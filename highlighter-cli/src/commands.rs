//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use crossbeam_channel::{never, select};
use tracing::{info, warn};

use highlighter_clips::{Clip, ClipLibrary};
use highlighter_ipc::{
    ClipInfo, ExportSettings, HighlighterCommand, HighlighterEvent, HighlighterState,
};
use highlighter_realtime::{derive_highlights, MockVisionService, RealtimeConfig};
use highlighter_render::create_backend;

use crate::cli::{Args, ClipsAction, Commands, ExportArgs};
use crate::config::AppConfig;
use crate::session::EngineSession;

/// Execute the parsed command line.
pub fn run(args: Args) -> anyhow::Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    let library = args.library.as_deref();

    match args.command {
        Commands::Clips { action } => clips(&config, library, action),
        Commands::Markers {
            format,
            output,
            stream,
            fps,
        } => {
            let session = start_engine(&config, library)?;
            let path = session.request(
                HighlighterCommand::ExportMarkers {
                    format: format.into(),
                    stream_id: stream,
                    path: output,
                    fps,
                },
                |event| match event {
                    HighlighterEvent::MarkersExported { path } => Some(path.clone()),
                    _ => None,
                },
            )?;
            println!("Markers written to {}", path.display());
            session.shutdown()
        }
        Commands::Export(export_args) => export(&config, library, &export_args),
        Commands::Highlights { events, compact } => highlights(&config, &events, compact),
        Commands::Realtime {
            events,
            replay,
            stream,
            time_scale,
            out_dir,
        } => realtime(
            &config,
            library,
            &events,
            &replay,
            stream,
            time_scale,
            out_dir,
        ),
    }
}

fn start_engine(config: &AppConfig, library: Option<&Path>) -> anyhow::Result<EngineSession> {
    let backend = create_backend(config.ffmpeg.paths()).context("ffmpeg is required")?;
    EngineSession::start(backend, config.engine_config(library))
}

fn clips_changed(event: &HighlighterEvent) -> Option<()> {
    matches!(event, HighlighterEvent::ClipsChanged { .. }).then_some(())
}

fn clips(config: &AppConfig, library: Option<&Path>, action: ClipsAction) -> anyhow::Result<()> {
    if let ClipsAction::List { stream, json } = &action {
        let path = library.unwrap_or(config.library.path.as_path());
        let collection = ClipLibrary::new(path)
            .load()
            .with_context(|| format!("Failed to load library {}", path.display()))?;
        let clips = collection.clips(stream.as_deref());
        if *json {
            let infos: Vec<ClipInfo> = clips
                .iter()
                .map(|clip| clip.to_info(stream.as_deref()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&infos)?);
        } else {
            print_clip_table(&clips, stream.as_deref());
        }
        return Ok(());
    }

    let session = start_engine(config, library)?;
    match action {
        ClipsAction::List { .. } => {}
        ClipsAction::Add {
            paths,
            stream,
            source,
        } => {
            session.request(
                HighlighterCommand::AddClips {
                    paths,
                    stream_id: stream.clone(),
                    source: source.into(),
                },
                clips_changed,
            )?;

            // Probe failures arrive after the change notification
            session.send(HighlighterCommand::GetClips { stream_id: stream })?;
            let infos = loop {
                match session
                    .events()
                    .recv_timeout(Duration::from_secs(30))
                    .context("Timed out waiting for the engine")?
                {
                    HighlighterEvent::Clips { clips, .. } => break clips,
                    HighlighterEvent::Error { message, .. } => warn!("{}", message),
                    _ => {}
                }
            };
            let unloaded = infos.iter().filter(|info| !info.loaded).count();
            println!("{} clips in collection, {} not loaded", infos.len(), unloaded);
        }
        ClipsAction::Trim { path, start, end } => {
            session.request(
                HighlighterCommand::TrimClip {
                    path,
                    start_trim: start,
                    end_trim: end,
                },
                clips_changed,
            )?;
        }
        ClipsAction::Enable { path } => {
            session.request(
                HighlighterCommand::SetClipEnabled {
                    path,
                    enabled: true,
                },
                clips_changed,
            )?;
        }
        ClipsAction::Disable { path } => {
            session.request(
                HighlighterCommand::SetClipEnabled {
                    path,
                    enabled: false,
                },
                clips_changed,
            )?;
        }
        ClipsAction::Reorder { paths, stream } => {
            session.request(
                HighlighterCommand::ReorderClips {
                    stream_id: stream,
                    paths,
                },
                clips_changed,
            )?;
        }
        ClipsAction::Remove { path } => {
            session.request(HighlighterCommand::RemoveClip { path }, clips_changed)?;
        }
    }
    session.shutdown()
}

fn print_clip_table(clips: &[&Clip], stream_id: Option<&str>) {
    if clips.is_empty() {
        println!("No clips");
        return;
    }
    for clip in clips {
        let position = clip.order_position(stream_id).unwrap_or_default();
        let state = match (clip.enabled, clip.loaded) {
            (_, false) => "unloaded",
            (true, true) => "enabled",
            (false, true) => "disabled",
        };
        let length = clip
            .trimmed_duration()
            .map(|d| format!("{d:7.2}s"))
            .unwrap_or_else(|| "       ?".to_string());
        println!(
            "{:>3}  {:<8}  {}  {}  ({})",
            position,
            state,
            length,
            clip.title(),
            clip.path.display()
        );
    }
}

impl ExportArgs {
    /// Configured settings with the command line overrides applied.
    pub fn settings(&self, base: &ExportSettings) -> ExportSettings {
        let mut settings = base.clone();
        settings.file_path = self.output.clone();
        if let Some(resolution) = self.resolution {
            settings.resolution = resolution.into();
        }
        if let Some(fps) = self.fps {
            settings.fps = fps.into();
        }
        if let Some(preset) = self.preset {
            settings.preset = preset.into();
        }
        if let Some(kind) = self.transition {
            settings.transition.kind = kind.into();
        }
        if let Some(secs) = self.transition_secs {
            settings.transition.duration_secs = secs;
        }
        if self.vertical {
            settings.orientation = highlighter_ipc::Orientation::Vertical;
        }
        if let Some(music) = &self.music {
            settings.music.enabled = true;
            settings.music.path = Some(music.clone());
        }
        if let Some(volume) = self.music_volume {
            settings.music.volume = volume;
        }
        if self.intro.is_some() {
            settings.intro_path = self.intro.clone();
        }
        if self.outro.is_some() {
            settings.outro_path = self.outro.clone();
        }
        if self.subtitles.is_some() {
            settings.subtitles_path = self.subtitles.clone();
        }
        settings
    }
}

fn export(config: &AppConfig, library: Option<&Path>, args: &ExportArgs) -> anyhow::Result<()> {
    let settings = args.settings(&config.export);
    let session = start_engine(config, library)?;
    session.send(HighlighterCommand::Export {
        settings,
        stream_id: args.stream.clone(),
    })?;

    let mut reported = 0u64;
    loop {
        let event = session.events().recv().context("Engine stopped during export")?;
        match event {
            HighlighterEvent::StateChanged { current, .. } => {
                if let HighlighterState::Exporting { phase } = *current {
                    info!(phase = phase.name(), "Export phase");
                }
            }
            HighlighterEvent::ExportProgress(progress) => {
                let decile = (progress.percent() / 10.0) as u64;
                if decile > reported {
                    reported = decile;
                    info!(
                        frame = progress.current_frame,
                        total = progress.total_frames,
                        "{:.0}%",
                        progress.percent()
                    );
                }
            }
            HighlighterEvent::ExportFinished { path } => {
                println!("Exported {}", path.display());
                break;
            }
            HighlighterEvent::ExportCancelled => bail!("Export cancelled"),
            HighlighterEvent::Error { message, .. } => bail!("Export failed: {}", message),
            _ => {}
        }
    }
    session.shutdown()
}

fn highlights(config: &AppConfig, events: &Path, compact: bool) -> anyhow::Result<()> {
    let script = MockVisionService::from_file(events)
        .with_context(|| format!("Failed to read events {}", events.display()))?;
    let windows = derive_highlights(script.events(), &config.realtime.rules);
    info!(
        inputs = script.events().len(),
        windows = windows.len(),
        "Highlights derived"
    );

    let json = if compact {
        serde_json::to_string(&windows)?
    } else {
        serde_json::to_string_pretty(&windows)?
    };
    println!("{json}");
    Ok(())
}

/// Copies the recording once per requested replay save.
struct ReplaySaver {
    source: PathBuf,
    dir: PathBuf,
    saved: usize,
}

impl ReplaySaver {
    fn new(source: &Path, dir: Option<PathBuf>) -> Self {
        let dir = dir.unwrap_or_else(|| {
            source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });
        Self {
            source: source.to_path_buf(),
            dir,
            saved: 0,
        }
    }

    fn save(&mut self) -> anyhow::Result<PathBuf> {
        self.saved += 1;
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "replay".to_string());
        let extension = self
            .source
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let target = self
            .dir
            .join(format!("{stem}-replay-{:03}{extension}", self.saved));

        if !self.dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.dir)
                .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        }
        fs::copy(&self.source, &target)
            .with_context(|| format!("Failed to save replay {}", target.display()))?;
        info!(path = %target.display(), "Replay saved");
        Ok(target)
    }
}

/// Recording seconds after the last input until its window has been saved.
fn settle_secs(config: &RealtimeConfig) -> f64 {
    let rules = &config.rules;
    let post = rules
        .kinds
        .values()
        .chain(std::iter::once(&rules.fallback))
        .map(|rule| rule.post_secs)
        .fold(0.0, f64::max);
    post + config.settle_delay_secs + 1.0
}

struct Simulation<'a> {
    session: &'a EngineSession,
    saver: ReplaySaver,
    buffer_secs: f64,
    added: Vec<PathBuf>,
}

impl Simulation<'_> {
    fn on_event(&mut self, event: HighlighterEvent) -> anyhow::Result<()> {
        match event {
            HighlighterEvent::SaveReplayRequested { now } => {
                let path = self.saver.save()?;
                self.session.send(HighlighterCommand::ReplayBufferSaved {
                    path,
                    end_time: now,
                    duration: self.buffer_secs,
                })?;
            }
            HighlighterEvent::HighlightClipAdded { path } => {
                println!("Highlight clip {}", path.display());
                self.added.push(path);
            }
            HighlighterEvent::Error { message, .. } => warn!("Engine error: {}", message),
            _ => {}
        }
        Ok(())
    }
}

fn realtime(
    config: &AppConfig,
    library: Option<&Path>,
    events: &Path,
    replay: &Path,
    stream_id: String,
    time_scale: f64,
    out_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if !(time_scale > 0.0) {
        bail!("time scale must be positive");
    }
    if !replay.is_file() {
        bail!("Replay recording {} not found", replay.display());
    }
    let script = MockVisionService::from_file(events)
        .with_context(|| format!("Failed to read events {}", events.display()))?
        .with_time_scale(time_scale);

    let backend = create_backend(config.ffmpeg.paths()).context("ffmpeg is required")?;
    let mut engine_config = config.engine_config(library);
    engine_config.realtime_time_scale = time_scale;
    let session = EngineSession::start(backend, engine_config)?;

    session.request(HighlighterCommand::StartRealtime { stream_id }, |event| {
        matches!(event, HighlighterEvent::StateChanged { current, .. } if current.is_detecting())
            .then_some(())
    })?;

    let (vision_tx, vision_rx) = crossbeam_channel::unbounded();
    let mock = script.spawn(vision_tx);
    let linger = Duration::from_secs_f64(settle_secs(&config.realtime) * time_scale)
        + Duration::from_millis(500);

    let mut sim = Simulation {
        session: &session,
        saver: ReplaySaver::new(replay, out_dir),
        buffer_secs: config.realtime.buffer_duration_secs,
        added: Vec::new(),
    };
    let mut vision = vision_rx;
    let mut deadline: Option<Instant> = None;

    loop {
        let wait = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(500));
        let mut script_done = false;
        select! {
            recv(vision) -> msg => match msg {
                Ok(input) => session.send(HighlighterCommand::VisionEvent(input))?,
                Err(_) => script_done = true,
            },
            recv(session.events()) -> msg => {
                sim.on_event(msg.context("Engine stopped during detection")?)?;
            },
            default(wait) => {}
        }
        if script_done {
            vision = never();
            deadline = Some(Instant::now() + linger);
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }
    let sent = mock.join();

    session.send(HighlighterCommand::StopRealtime)?;
    loop {
        let event = session
            .events()
            .recv_timeout(Duration::from_secs(30))
            .context("Timed out waiting for detection to stop")?;
        if let HighlighterEvent::StateChanged { current, .. } = &event {
            if current.is_idle() {
                break;
            }
        }
        sim.on_event(event)?;
    }

    info!(inputs = sent, clips = sim.added.len(), "Realtime simulation finished");
    println!("{} highlight clips from {} inputs", sim.added.len(), sent);
    session.shutdown()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use highlighter_ipc::{Fps, Orientation, Resolution, TransitionKind};

    fn export_args(argv: &[&str]) -> ExportArgs {
        let mut full = vec!["highlighter", "export"];
        full.extend_from_slice(argv);
        match Args::try_parse_from(full).unwrap().command {
            Commands::Export(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_export_overrides() {
        let base = ExportSettings {
            fps: Fps::F60,
            ..Default::default()
        };
        let args = export_args(&[
            "-o",
            "out.mp4",
            "--resolution",
            "1440",
            "--vertical",
            "--music",
            "song.mp3",
            "--transition",
            "none",
        ]);
        let settings = args.settings(&base);

        assert_eq!(settings.file_path, PathBuf::from("out.mp4"));
        assert_eq!(settings.resolution, Resolution::R1440);
        assert_eq!(settings.fps, Fps::F60);
        assert_eq!(settings.orientation, Orientation::Vertical);
        assert!(settings.music.enabled);
        assert_eq!(settings.music.path, Some(PathBuf::from("song.mp3")));
        assert_eq!(settings.music.volume, 50);
        assert_eq!(settings.transition.kind, TransitionKind::None);
    }

    #[test]
    fn test_export_keeps_configured_intro() {
        let base = ExportSettings {
            intro_path: Some(PathBuf::from("intro.mp4")),
            ..Default::default()
        };
        let settings = export_args(&["-o", "out.mp4"]).settings(&base);
        assert_eq!(settings.intro_path, Some(PathBuf::from("intro.mp4")));
        assert_eq!(settings.orientation, Orientation::Horizontal);
    }

    #[test]
    fn test_replay_saver_numbers_copies() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("recording.mp4");
        fs::write(&source, b"video").unwrap();

        let mut saver = ReplaySaver::new(&source, Some(dir.path().join("saves")));
        let first = saver.save().unwrap();
        let second = saver.save().unwrap();

        assert_eq!(first, dir.path().join("saves/recording-replay-001.mp4"));
        assert_eq!(second, dir.path().join("saves/recording-replay-002.mp4"));
        assert_eq!(fs::read(&second).unwrap(), b"video");
    }

    #[test]
    fn test_replay_saver_defaults_next_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("rec.mkv");
        fs::write(&source, b"x").unwrap();

        let mut saver = ReplaySaver::new(&source, None);
        assert_eq!(saver.save().unwrap(), dir.path().join("rec-replay-001.mkv"));
    }

    #[test]
    fn test_settle_covers_longest_padding() {
        let config = RealtimeConfig::default();
        // Victory keeps 5 s after the input
        assert_eq!(settle_secs(&config), 5.0 + 3.0 + 1.0);
    }
}
