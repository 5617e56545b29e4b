//! In-memory media backend for tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use highlighter_render::{
    AudioPlan, AudioRenderer, Frame, FrameSink, FrameSource, MediaBackend, MediaInfo, Prober,
    RenderError, RenderResult, SourceConfig, StillFrameSource, WriterConfig,
};

/// What the fake backend was asked to do.
#[derive(Debug, Default)]
pub struct FakeLog {
    pub audio_plans: Vec<AudioPlan>,
    pub sinks: Vec<WriterConfig>,
    pub sources: Vec<SourceConfig>,
    pub frames_written: u64,
    pub finished: usize,
    pub aborted: usize,
}

/// Probes from a table and renders solid frames.
#[derive(Clone, Default)]
pub struct FakeBackend {
    durations: HashMap<PathBuf, f64>,
    stills: HashSet<PathBuf>,
    missing: HashSet<PathBuf>,
    fail_sink: bool,
    fail_open: bool,
    hold: Option<Arc<AtomicBool>>,
    pub log: Arc<Mutex<FakeLog>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, path: &str, duration: f64) -> Self {
        self.durations.insert(PathBuf::from(path), duration);
        self
    }

    pub fn with_still(mut self, path: &str) -> Self {
        self.stills.insert(PathBuf::from(path));
        self
    }

    pub fn with_missing(mut self, path: &str) -> Self {
        self.missing.insert(PathBuf::from(path));
        self
    }

    pub fn failing_sink(mut self) -> Self {
        self.fail_sink = true;
        self
    }

    /// The encoder cannot be started.
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// After the first frame, writes block while `hold` is set.
    pub fn held_sink(mut self, hold: Arc<AtomicBool>) -> Self {
        self.hold = Some(hold);
        self
    }
}

impl Prober for FakeBackend {
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo> {
        if self.missing.contains(path) {
            return Err(RenderError::Probe {
                path: path.display().to_string(),
                message: "file not found".to_string(),
            });
        }
        let is_still = self.stills.contains(path);
        Ok(MediaInfo {
            duration: (!is_still).then(|| self.durations.get(path).copied().unwrap_or(10.0)),
            width: 1920,
            height: 1080,
            has_audio: !is_still,
            is_still,
        })
    }
}

impl AudioRenderer for FakeBackend {
    fn render_audio(&self, plan: &AudioPlan) -> RenderResult<()> {
        std::fs::write(&plan.output, b"fLaC")?;
        self.log.lock().audio_plans.push(plan.clone());
        Ok(())
    }
}

impl MediaBackend for FakeBackend {
    fn open_source(&self, config: &SourceConfig) -> RenderResult<Box<dyn FrameSource>> {
        self.log.lock().sources.push(config.clone());
        Ok(Box::new(StillFrameSource::new(
            Frame::solid(config.width, config.height, [10, 20, 30, 255]),
            config.frame_count,
        )))
    }

    fn open_sink(&self, config: &WriterConfig) -> RenderResult<Box<dyn FrameSink>> {
        self.log.lock().sinks.push(config.clone());
        if self.fail_open {
            return Err(RenderError::BinaryNotFound("ffmpeg"));
        }
        std::fs::write(&config.output, b"")?;
        Ok(Box::new(FakeSink {
            output: config.output.clone(),
            written: 0,
            fail: self.fail_sink,
            hold: self.hold.clone(),
            log: Arc::clone(&self.log),
        }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeSink {
    output: PathBuf,
    written: u64,
    fail: bool,
    hold: Option<Arc<AtomicBool>>,
    log: Arc<Mutex<FakeLog>>,
}

impl FrameSink for FakeSink {
    fn write_frame(&mut self, _frame: &Frame) -> RenderResult<()> {
        if self.fail && self.written == 2 {
            return Err(RenderError::Ffmpeg("encoder crashed".to_string()));
        }
        if let Some(hold) = self.hold.as_ref().filter(|_| self.written > 0) {
            while hold.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }
        self.written += 1;
        self.log.lock().frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.written
    }

    fn finish(self: Box<Self>) -> RenderResult<()> {
        std::fs::write(&self.output, b"mp4")?;
        self.log.lock().finished += 1;
        Ok(())
    }

    fn abort(self: Box<Self>) {
        self.log.lock().aborted += 1;
    }
}
