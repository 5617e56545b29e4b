//! Export progress tracking.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

use highlighter_ipc::{ExportProgress, ExportStep};

/// Shared between the engine loop and the export thread.
pub struct ProgressTracker {
    step: AtomicU8,
    total_frames: AtomicU64,
    current_frame: AtomicU64,
    cancel_requested: AtomicBool,
    error: RwLock<Option<String>>,
    start_time: RwLock<Option<Instant>>,
    last_reported_frame: AtomicU64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            step: AtomicU8::new(step_code(ExportStep::AudioMix)),
            total_frames: AtomicU64::new(0),
            current_frame: AtomicU64::new(0),
            cancel_requested: AtomicBool::new(false),
            error: RwLock::new(None),
            start_time: RwLock::new(None),
            last_reported_frame: AtomicU64::new(0),
        }
    }

    /// Prepare for a new export.
    pub fn start(&self, total_frames: u64) {
        self.step
            .store(step_code(ExportStep::AudioMix), Ordering::Relaxed);
        self.total_frames.store(total_frames, Ordering::Relaxed);
        self.current_frame.store(0, Ordering::Relaxed);
        self.last_reported_frame.store(0, Ordering::Relaxed);
        self.cancel_requested.store(false, Ordering::SeqCst);
        *self.error.write() = None;
        *self.start_time.write() = Some(Instant::now());
    }

    pub fn set_step(&self, step: ExportStep) {
        self.step.store(step_code(step), Ordering::Relaxed);
    }

    pub fn set_total_frames(&self, total_frames: u64) {
        self.total_frames.store(total_frames, Ordering::Relaxed);
    }

    /// Record the running count of written frames.
    pub fn record_frames(&self, written: u64) {
        self.current_frame.store(written, Ordering::Relaxed);
    }

    pub fn request_cancel(&self) {
        debug!("Export cancel requested");
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// The flag polled by the render loop.
    pub fn cancel_flag(&self) -> &AtomicBool {
        &self.cancel_requested
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.error.write() = Some(message.into());
    }

    /// Frames rendered per wall second since the export started.
    pub fn frames_per_second(&self) -> f64 {
        let frames = self.current_frame.load(Ordering::Relaxed);
        match *self.start_time.read() {
            Some(start) => {
                let secs = start.elapsed().as_secs_f64();
                if secs > 0.0 {
                    frames as f64 / secs
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Whether frames were written since the last [`mark_reported`](Self::mark_reported).
    pub fn has_new_frames(&self) -> bool {
        self.current_frame.load(Ordering::Relaxed)
            != self.last_reported_frame.load(Ordering::Relaxed)
    }

    pub fn mark_reported(&self) {
        self.last_reported_frame.store(
            self.current_frame.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
    }

    /// Current progress.
    pub fn snapshot(&self) -> ExportProgress {
        ExportProgress {
            step: step_from_code(self.step.load(Ordering::Relaxed)),
            total_frames: self.total_frames.load(Ordering::Relaxed),
            current_frame: self.current_frame.load(Ordering::Relaxed),
            cancel_requested: self.is_cancel_requested(),
            error: self.error.read().clone(),
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn step_code(step: ExportStep) -> u8 {
    match step {
        ExportStep::AudioMix => 0,
        ExportStep::Frames => 1,
    }
}

fn step_from_code(code: u8) -> ExportStep {
    match code {
        1 => ExportStep::Frames,
        _ => ExportStep::AudioMix,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_updates() {
        let tracker = ProgressTracker::new();
        tracker.start(300);
        tracker.set_step(ExportStep::Frames);
        tracker.record_frames(150);

        let progress = tracker.snapshot();
        assert_eq!(progress.step, ExportStep::Frames);
        assert_eq!(progress.percent(), 50.0);
        assert!(!progress.cancel_requested);
        assert!(progress.error.is_none());
    }

    #[test]
    fn test_start_resets_cancel_and_error() {
        let tracker = ProgressTracker::new();
        tracker.request_cancel();
        tracker.fail("boom");
        assert!(tracker.cancel_flag().load(Ordering::SeqCst));

        tracker.start(10);
        let progress = tracker.snapshot();
        assert!(!progress.cancel_requested);
        assert!(progress.error.is_none());
        assert_eq!(progress.step, ExportStep::AudioMix);
    }

    #[test]
    fn test_new_frames_since_report() {
        let tracker = ProgressTracker::new();
        tracker.start(10);
        assert!(!tracker.has_new_frames());
        tracker.record_frames(3);
        assert!(tracker.has_new_frames());
        tracker.mark_reported();
        assert!(!tracker.has_new_frames());
    }
}
