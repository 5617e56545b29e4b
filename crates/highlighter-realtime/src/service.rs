//! Realtime highlight detection against a rolling replay buffer.
//!
//! Inputs arrive while recording. Once a highlight has settled, or its start
//! is about to scroll out of the replay buffer, the service asks for the
//! buffer to be saved. The saved file becomes one clip trimmed to the union
//! of the windows it covers.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};

use highlighter_clips::{AiClipInfo, Clip, StreamClipInfo, MIN_CLIP_DURATION};
use highlighter_ipc::{ClipSource, InputEvent};

use crate::error::RealtimeError;
use crate::highlights::{derive_highlights, HighlightRules, HighlightWindow};
use crate::RealtimeResult;

/// Timing of the replay buffer and save decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Seconds of footage the replay buffer keeps.
    pub buffer_duration_secs: f64,

    /// Quiet time after a window ends before saving.
    pub settle_delay_secs: f64,

    /// Save early when a window start is this close to leaving the buffer.
    pub safety_margin_secs: f64,

    /// Window derivation rules.
    pub rules: HighlightRules,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            buffer_duration_secs: 30.0,
            settle_delay_secs: 3.0,
            safety_margin_secs: 5.0,
            rules: HighlightRules::default(),
        }
    }
}

impl RealtimeConfig {
    /// Check timing and rules.
    pub fn validate(&self) -> RealtimeResult<()> {
        if !(self.buffer_duration_secs > 0.0) {
            return Err(RealtimeError::InvalidConfig(
                "buffer duration must be positive".to_string(),
            ));
        }
        if !(self.settle_delay_secs >= 0.0)
            || !(self.safety_margin_secs >= 0.0)
            || self.safety_margin_secs >= self.buffer_duration_secs
        {
            return Err(RealtimeError::InvalidConfig(
                "settle delay and safety margin must be non-negative and shorter than the buffer"
                    .to_string(),
            ));
        }
        self.rules.validate()
    }
}

/// Input to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeInput {
    /// A detected gameplay input.
    Vision(InputEvent),

    /// The replay buffer was written to `path`, ending at `end_time`
    /// recording seconds and `duration` seconds long.
    ReplayBufferReady {
        path: PathBuf,
        end_time: f64,
        duration: f64,
    },

    /// Current recording time.
    Tick(f64),
}

/// What the caller should do.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeAction {
    /// Save the replay buffer.
    SaveReplay,

    /// A highlight clip is ready to join the collection.
    ClipReady(Clip),

    /// A highlight could not be kept.
    Dropped { reason: String },
}

/// Decides when to save the replay buffer and what to keep from it.
#[derive(Debug)]
pub struct RealtimeHighlighter {
    config: RealtimeConfig,
    stream_id: Option<String>,
    running: bool,
    pending: Vec<InputEvent>,
    save_in_flight: bool,
    now: f64,
}

impl RealtimeHighlighter {
    pub fn new(config: RealtimeConfig) -> Self {
        Self {
            config,
            stream_id: None,
            running: false,
            pending: Vec::new(),
            save_in_flight: false,
            now: 0.0,
        }
    }

    /// Start detecting for `stream_id`.
    pub fn start(&mut self, stream_id: Option<String>) -> RealtimeResult<()> {
        if self.running {
            return Err(RealtimeError::AlreadyRunning);
        }
        self.config.validate()?;
        info!(stream_id = ?stream_id, "Realtime highlighter started");
        self.stream_id = stream_id;
        self.running = true;
        self.pending.clear();
        self.save_in_flight = false;
        self.now = 0.0;
        Ok(())
    }

    /// Stop detecting. Returns the number of discarded pending inputs.
    pub fn stop(&mut self) -> RealtimeResult<usize> {
        if !self.running {
            return Err(RealtimeError::NotRunning);
        }
        self.running = false;
        self.save_in_flight = false;
        let discarded = self.pending.len();
        self.pending.clear();
        info!(discarded, "Realtime highlighter stopped");
        Ok(discarded)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a replay save has been requested and not yet delivered.
    pub fn save_in_flight(&self) -> bool {
        self.save_in_flight
    }

    /// Stream the clips are attached to.
    pub fn stream_id(&self) -> Option<&str> {
        self.stream_id.as_deref()
    }

    /// Latest recording time seen.
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Windows waiting for a replay save.
    pub fn pending_windows(&self) -> Vec<HighlightWindow> {
        derive_highlights(&self.pending, &self.config.rules)
    }

    /// Feed one input; returns the actions to perform, in order.
    #[instrument(skip(self), level = "trace")]
    pub fn handle(&mut self, input: RealtimeInput) -> Vec<RealtimeAction> {
        if !self.running {
            trace!("Ignoring input while stopped");
            return Vec::new();
        }

        match input {
            RealtimeInput::Vision(event) => {
                if !event.kind.is_highlight() || !event.timestamp_secs.is_finite() {
                    trace!(kind = ?event.kind, "Ignoring input");
                    return Vec::new();
                }
                self.now = self.now.max(event.timestamp_secs);
                debug!(kind = ?event.kind, at = event.timestamp_secs, "Highlight input");
                self.pending.push(event);
                self.check_save()
            }
            RealtimeInput::Tick(now) => {
                self.now = self.now.max(now);
                self.check_save()
            }
            RealtimeInput::ReplayBufferReady {
                path,
                end_time,
                duration,
            } => {
                self.now = self.now.max(end_time);
                self.save_in_flight = false;
                let mut actions = self.collect_clip(path, end_time, duration);
                actions.extend(self.check_save());
                actions
            }
        }
    }

    fn check_save(&mut self) -> Vec<RealtimeAction> {
        if self.save_in_flight {
            return Vec::new();
        }
        let windows = self.pending_windows();
        let Some(oldest) = windows.first() else {
            return Vec::new();
        };

        let settled = self.now >= oldest.end + self.config.settle_delay_secs;
        let expiring = self.now - oldest.start
            >= self.config.buffer_duration_secs - self.config.safety_margin_secs;

        if settled || expiring {
            info!(
                start = oldest.start,
                end = oldest.end,
                settled,
                expiring,
                "Requesting replay buffer save"
            );
            self.save_in_flight = true;
            vec![RealtimeAction::SaveReplay]
        } else {
            Vec::new()
        }
    }

    fn collect_clip(&mut self, path: PathBuf, end_time: f64, duration: f64) -> Vec<RealtimeAction> {
        let mut actions = Vec::new();
        if !(duration > 0.0) || !end_time.is_finite() {
            warn!(path = %path.display(), duration, "Replay buffer has no usable footage");
            return vec![RealtimeAction::Dropped {
                reason: format!("replay {} is empty", path.display()),
            }];
        }

        let buffer_start = end_time - duration;
        let mut covered: Vec<HighlightWindow> = Vec::new();
        let mut kept: Vec<InputEvent> = Vec::new();

        for window in self.pending_windows() {
            if window.start >= end_time {
                // Not recorded yet; stays pending for the next save.
                kept.extend(window.inputs);
            } else if window.end <= buffer_start {
                warn!(
                    start = window.start,
                    end = window.end,
                    buffer_start,
                    "Highlight fell out of the replay buffer"
                );
                actions.push(RealtimeAction::Dropped {
                    reason: format!(
                        "highlight {:.1}s-{:.1}s is older than the replay buffer",
                        window.start, window.end
                    ),
                });
            } else {
                let (inside, later): (Vec<InputEvent>, Vec<InputEvent>) = window
                    .inputs
                    .iter()
                    .cloned()
                    .partition(|e| e.timestamp_secs <= end_time);
                kept.extend(later);
                // Inputs past the buffer are scored again once re-queued.
                let score = inside.iter().map(|e| self.config.rules.score(e)).sum();
                covered.push(HighlightWindow {
                    start: window.start.max(buffer_start),
                    end: window.end.min(end_time),
                    inputs: inside,
                    score,
                });
            }
        }
        self.pending = kept;

        if covered.is_empty() {
            debug!(path = %path.display(), "Replay saved without pending highlights");
            return actions;
        }

        let start = covered.iter().map(|w| w.start).fold(f64::INFINITY, f64::min);
        let end = covered.iter().map(|w| w.end).fold(f64::NEG_INFINITY, f64::max);
        if end - start < MIN_CLIP_DURATION {
            warn!(start, end, "Highlight too short after clamping");
            actions.push(RealtimeAction::Dropped {
                reason: format!("highlight {start:.1}s-{end:.1}s is too short"),
            });
            return actions;
        }

        let inputs: Vec<InputEvent> = covered
            .iter()
            .flat_map(|w| w.inputs.iter())
            .map(|e| InputEvent {
                timestamp_secs: e.timestamp_secs - buffer_start,
                ..e.clone()
            })
            .collect();
        let score: f64 = covered.iter().map(|w| w.score).sum();

        let mut clip = Clip::new(path, ClipSource::AiClip);
        clip.loaded = true;
        clip.duration = Some(duration);
        clip.start_trim = start - buffer_start;
        clip.end_trim = end_time - end;
        clip.ai_info = Some(AiClipInfo { inputs, score });
        if let Some(id) = &self.stream_id {
            clip.stream_info.insert(
                id.clone(),
                StreamClipInfo {
                    order_position: 0,
                    initial_start_time: Some(start),
                    initial_end_time: Some(end),
                },
            );
        }

        info!(
            path = %clip.path.display(),
            start_trim = clip.start_trim,
            end_trim = clip.end_trim,
            windows = covered.len(),
            "Highlight clip ready"
        );
        actions.push(RealtimeAction::ClipReady(clip));
        actions
    }
}
