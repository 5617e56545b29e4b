//! A scripted stand-in for the vision service.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, info};

use highlighter_ipc::InputEvent;

use crate::RealtimeResult;

/// Replays a fixed list of inputs, optionally paced in real time.
#[derive(Debug, Clone)]
pub struct MockVisionService {
    events: Vec<InputEvent>,
    time_scale: f64,
}

impl MockVisionService {
    /// Script of inputs, emitted in timestamp order without delays.
    pub fn new(mut events: Vec<InputEvent>) -> Self {
        events.sort_by(|a, b| a.timestamp_secs.total_cmp(&b.timestamp_secs));
        Self {
            events,
            time_scale: 0.0,
        }
    }

    /// Load a JSON array of inputs.
    pub fn from_file(path: &Path) -> RealtimeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Parse a JSON array of inputs.
    pub fn from_json(text: &str) -> RealtimeResult<Self> {
        let events: Vec<InputEvent> = serde_json::from_str(text)?;
        Ok(Self::new(events))
    }

    /// Sleep `time_scale` wall seconds per recording second between inputs.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    /// The scripted inputs.
    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    /// Emit the script on a thread.
    pub fn spawn(self, tx: Sender<InputEvent>) -> MockVisionHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            let mut last = 0.0;
            let mut sent = 0usize;
            for event in self.events {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                let wait = (event.timestamp_secs - last).max(0.0) * self.time_scale;
                if wait > 0.0 {
                    thread::sleep(Duration::from_secs_f64(wait));
                }
                last = event.timestamp_secs;

                debug!(kind = ?event.kind, at = event.timestamp_secs, "Mock vision event");
                if tx.send(event).is_err() {
                    break;
                }
                sent += 1;
            }
            info!(sent, "Mock vision service finished");
            sent
        });

        MockVisionHandle { stop, thread }
    }
}

/// Controls a running [`MockVisionService`].
pub struct MockVisionHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<usize>,
}

impl MockVisionHandle {
    /// Ask the thread to stop after the current input.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Wait for the thread; returns the number of inputs sent.
    pub fn join(self) -> usize {
        self.thread.join().unwrap_or(0)
    }
}
