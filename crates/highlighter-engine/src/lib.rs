//! Core orchestrator for the highlighter.
//!
//! The engine owns the clip collection, runs exports on a worker thread and
//! drives realtime highlight detection, all behind the command/event
//! channels defined in `highlighter-ipc`.

mod error;
mod orchestrator;
mod plan;
mod progress;
mod state;
#[cfg(test)]
mod testing;

pub use error::EngineError;
pub use orchestrator::{Engine, EngineConfig};
pub use plan::{plan_export, ExportPlan};
pub use progress::ProgressTracker;
pub use state::{ExportArtifacts, ExportResources};

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use highlighter_ipc::{HighlighterCommand, HighlighterEvent};
use highlighter_render::MediaBackend;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Create an engine instance with IPC channels.
pub fn create_engine(
    command_rx: Receiver<HighlighterCommand>,
    event_tx: Sender<HighlighterEvent>,
    backend: Arc<dyn MediaBackend>,
    config: EngineConfig,
) -> Engine {
    Engine::new(command_rx, event_tx, backend, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use highlighter_ipc::{
        ClipSource, ExportSettings, InputEvent, InputKind, MarkerFormat,
        Resolution, TransitionKind, TransitionSettings,
    };

    use crate::testing::FakeBackend;

    struct Harness {
        engine: Engine,
        events: Receiver<HighlighterEvent>,
        backend: FakeBackend,
        _commands: Sender<HighlighterCommand>,
    }

    fn harness_with(backend: FakeBackend, config: EngineConfig) -> Harness {
        let (command_tx, command_rx) = highlighter_ipc::command_channel();
        let (event_tx, event_rx) = highlighter_ipc::event_channel();
        let engine = create_engine(command_rx, event_tx, Arc::new(backend.clone()), config);
        Harness {
            engine,
            events: event_rx,
            backend,
            _commands: command_tx,
        }
    }

    fn harness(backend: FakeBackend) -> Harness {
        harness_with(backend, EngineConfig::default())
    }

    impl Harness {
        fn send(&mut self, command: HighlighterCommand) -> bool {
            self.engine.handle_command(command)
        }

        fn drain(&self) -> Vec<HighlighterEvent> {
            self.events.try_iter().collect()
        }

        /// Tick until an event matching `pred` arrives.
        fn wait_for(&mut self, pred: impl Fn(&HighlighterEvent) -> bool) -> Vec<HighlighterEvent> {
            let mut seen = Vec::new();
            for _ in 0..500 {
                self.engine.tick();
                while let Ok(event) = self.events.recv_timeout(Duration::from_millis(10)) {
                    let done = pred(&event);
                    seen.push(event);
                    if done {
                        self.engine.tick();
                        return seen;
                    }
                }
            }
            panic!("event never arrived, saw {seen:?}");
        }

        fn add(&mut self, paths: &[&str]) {
            self.send(HighlighterCommand::AddClips {
                paths: paths.iter().map(PathBuf::from).collect(),
                stream_id: None,
                source: ClipSource::Manual,
            });
        }
    }

    fn has_error(events: &[HighlighterEvent]) -> bool {
        events
            .iter()
            .any(|e| matches!(e, HighlighterEvent::Error { .. }))
    }

    fn export_settings(output: &Path) -> ExportSettings {
        ExportSettings {
            file_path: output.to_path_buf(),
            resolution: Resolution::R720,
            transition: TransitionSettings {
                kind: TransitionKind::None,
                duration_secs: 0.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_add_clips_probes_durations() {
        let backend = FakeBackend::new()
            .with_duration("a.mp4", 12.0)
            .with_missing("gone.mp4");
        let mut h = harness(backend);
        h.add(&["a.mp4", "gone.mp4"]);

        let a = h.engine.clips().get(Path::new("a.mp4")).unwrap();
        assert!(a.loaded);
        assert_eq!(a.duration, Some(12.0));
        assert!(!h.engine.clips().get(Path::new("gone.mp4")).unwrap().loaded);

        let events = h.drain();
        assert!(has_error(&events));
        assert!(events
            .iter()
            .any(|e| matches!(e, HighlighterEvent::ClipsChanged { stream_id: None })));
    }

    #[test]
    fn test_invalid_trim_reports_error() {
        let mut h = harness(FakeBackend::new().with_duration("a.mp4", 5.0));
        h.add(&["a.mp4"]);
        h.drain();

        h.send(HighlighterCommand::TrimClip {
            path: PathBuf::from("a.mp4"),
            start_trim: 3.0,
            end_trim: 1.5,
        });
        assert!(has_error(&h.drain()));
        assert_eq!(h.engine.clips().get(Path::new("a.mp4")).unwrap().start_trim, 0.0);
    }

    #[test]
    fn test_export_writes_output_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reel.mp4");
        let backend = FakeBackend::new()
            .with_duration("a.mp4", 1.0)
            .with_duration("b.mp4", 2.0);
        let mut h = harness(backend);
        h.add(&["a.mp4", "b.mp4"]);
        h.drain();

        h.send(HighlighterCommand::Export {
            settings: export_settings(&output),
            stream_id: None,
        });

        let events = h.wait_for(|e| matches!(e, HighlighterEvent::ExportFinished { .. }));
        assert!(!has_error(&events));
        assert!(h.engine.state().is_idle());

        assert_eq!(std::fs::read(&output).unwrap(), b"mp4");
        assert!(!dir.path().join(".reel.audio.flac").exists());

        let log = h.backend.log.lock();
        assert_eq!(log.frames_written, 90);
        assert_eq!(log.finished, 1);
        assert_eq!(log.sinks[0].audio, Some(dir.path().join(".reel.audio.flac")));
        assert_eq!(log.sources.len(), 2);
        assert_eq!(log.audio_plans[0].segments.len(), 2);
    }

    #[test]
    fn test_failed_export_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reel.mp4");
        let mut h = harness(FakeBackend::new().with_duration("a.mp4", 1.0).failing_sink());
        h.add(&["a.mp4"]);
        h.drain();

        h.send(HighlighterCommand::Export {
            settings: export_settings(&output),
            stream_id: None,
        });
        h.wait_for(|e| matches!(e, HighlighterEvent::Error { .. }));

        assert!(h.engine.state().is_error());
        assert!(!output.exists());
        assert!(!dir.path().join(".reel.audio.flac").exists());
        assert_eq!(h.backend.log.lock().aborted, 1);
    }

    #[test]
    fn test_failed_encoder_start_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reel.mp4");
        std::fs::write(&output, b"previous export").unwrap();
        let mut h = harness(FakeBackend::new().with_duration("a.mp4", 1.0).failing_open());
        h.add(&["a.mp4"]);
        h.drain();

        h.send(HighlighterCommand::Export {
            settings: export_settings(&output),
            stream_id: None,
        });
        h.wait_for(|e| matches!(e, HighlighterEvent::Error { .. }));

        assert!(h.engine.state().is_error());
        assert_eq!(std::fs::read(&output).unwrap(), b"previous export");
        assert!(!dir.path().join(".reel.audio.flac").exists());
    }

    #[test]
    fn test_cancel_during_render_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reel.mp4");
        let subtitles = dir.path().join("subs.srt");
        std::fs::write(&subtitles, "1\n00:00:00,000 --> 00:00:01,000\nGG\n").unwrap();

        let hold = Arc::new(AtomicBool::new(true));
        let backend = FakeBackend::new()
            .with_duration("a.mp4", 3.0)
            .held_sink(Arc::clone(&hold));
        let mut h = harness(backend);
        h.add(&["a.mp4"]);
        h.drain();

        let mut settings = export_settings(&output);
        settings.subtitles_path = Some(subtitles);
        h.send(HighlighterCommand::Export {
            settings,
            stream_id: None,
        });

        for _ in 0..500 {
            if h.backend.log.lock().frames_written > 0 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(h.backend.log.lock().frames_written, 1);
        assert!(output.exists());
        assert!(dir.path().join(".reel.audio.flac").exists());
        assert!(dir.path().join(".reel.subtitles.srt").exists());

        assert!(h.send(HighlighterCommand::CancelExport));
        hold.store(false, Ordering::SeqCst);
        let events = h.wait_for(|e| matches!(e, HighlighterEvent::ExportCancelled));

        assert!(!has_error(&events));
        assert!(h.engine.state().is_idle());
        assert!(!output.exists());
        assert!(!dir.path().join(".reel.audio.flac").exists());
        assert!(!dir.path().join(".reel.subtitles.srt").exists());

        let log = h.backend.log.lock();
        assert_eq!(log.aborted, 1);
        assert_eq!(log.finished, 0);
        assert!(log.frames_written < 90);
    }

    #[test]
    fn test_export_without_clips_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(FakeBackend::new());
        h.send(HighlighterCommand::Export {
            settings: export_settings(&dir.path().join("reel.mp4")),
            stream_id: None,
        });
        assert!(has_error(&h.drain()));
        assert!(h.engine.state().is_idle());
    }

    #[test]
    fn test_cancel_while_idle_is_noop() {
        let mut h = harness(FakeBackend::new());
        assert!(h.send(HighlighterCommand::CancelExport));
        assert!(h.drain().is_empty());
        assert!(h.engine.state().is_idle());
    }

    #[test]
    fn test_export_markers_writes_chapters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chapters.txt");
        let mut config = EngineConfig::default();
        config.export.transition = TransitionSettings {
            kind: TransitionKind::None,
            duration_secs: 0.0,
        };
        let backend = FakeBackend::new()
            .with_duration("first.mp4", 15.0)
            .with_duration("second.mp4", 20.0);
        let mut h = harness_with(backend, config);
        h.add(&["first.mp4", "second.mp4"]);
        h.drain();

        h.send(HighlighterCommand::ExportMarkers {
            format: MarkerFormat::YoutubeChapters,
            stream_id: None,
            path: path.clone(),
            fps: 30.0,
        });

        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, HighlighterEvent::MarkersExported { .. })));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "0:00 first\n0:15 second\n"
        );
    }

    #[test]
    fn test_realtime_highlight_becomes_clip() {
        let mut h = harness(FakeBackend::new());
        h.send(HighlighterCommand::StartRealtime {
            stream_id: "match-1".to_string(),
        });
        assert!(h.engine.state().is_detecting());

        h.send(HighlighterCommand::VisionEvent(InputEvent::new(InputKind::Kill, 40.0)));
        h.send(HighlighterCommand::VisionEvent(InputEvent::new(InputKind::Kill, 60.0)));
        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, HighlighterEvent::SaveReplayRequested { now } if *now == 60.0)));

        h.send(HighlighterCommand::ReplayBufferSaved {
            path: PathBuf::from("replay.mp4"),
            end_time: 60.0,
            duration: 30.0,
        });
        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, HighlighterEvent::HighlightClipAdded { .. })));

        let clips = h.engine.clips().clips(Some("match-1"));
        assert_eq!(clips.len(), 1);
        assert_eq!(clips[0].source, ClipSource::AiClip);
        assert_eq!(clips[0].start_trim, 5.0);
        assert_eq!(clips[0].end_trim, 0.0);

        h.send(HighlighterCommand::StopRealtime);
        assert!(h.engine.state().is_idle());
    }

    #[test]
    fn test_stop_realtime_while_idle_is_noop() {
        let mut h = harness(FakeBackend::new());
        h.send(HighlighterCommand::StopRealtime);
        assert!(!has_error(&h.drain()));
        assert!(h.engine.state().is_idle());
    }

    #[test]
    fn test_export_rejected_while_detecting() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = harness(FakeBackend::new().with_duration("a.mp4", 3.0));
        h.add(&["a.mp4"]);
        h.send(HighlighterCommand::StartRealtime {
            stream_id: "s".to_string(),
        });
        h.drain();

        h.send(HighlighterCommand::Export {
            settings: export_settings(&dir.path().join("reel.mp4")),
            stream_id: None,
        });
        assert!(has_error(&h.drain()));
        assert!(h.engine.state().is_detecting());
    }

    #[test]
    fn test_library_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            library_path: Some(dir.path().join("library.json")),
            ..Default::default()
        };

        let mut h = harness_with(FakeBackend::new().with_duration("a.mp4", 8.0), config.clone());
        h.add(&["a.mp4"]);
        h.send(HighlighterCommand::SaveLibrary);
        assert!(!has_error(&h.drain()));

        let reloaded = harness_with(FakeBackend::new(), config);
        let clip = reloaded.engine.clips().get(Path::new("a.mp4")).unwrap();
        assert_eq!(clip.duration, Some(8.0));
    }

    #[test]
    fn test_save_without_library_fails() {
        let mut h = harness(FakeBackend::new());
        h.send(HighlighterCommand::SaveLibrary);
        assert!(has_error(&h.drain()));
    }

    #[test]
    fn test_shutdown_stops_loop() {
        let mut h = harness(FakeBackend::new());
        assert!(!h.send(HighlighterCommand::Shutdown));
        assert!(h
            .drain()
            .iter()
            .any(|e| matches!(e, HighlighterEvent::Shutdown)));
    }
}
