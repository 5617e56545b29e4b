//! Deriving highlight time ranges from detected inputs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use highlighter_ipc::{InputEvent, InputKind};

use crate::error::RealtimeError;
use crate::RealtimeResult;

/// Padding and weight for one input kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KindRule {
    /// Seconds kept before the input.
    pub pre_secs: f64,

    /// Seconds kept after the input.
    pub post_secs: f64,

    /// Score contributed per occurrence.
    pub weight: f64,
}

impl KindRule {
    pub const fn new(pre_secs: f64, post_secs: f64, weight: f64) -> Self {
        Self {
            pre_secs,
            post_secs,
            weight,
        }
    }
}

/// How inputs turn into highlight windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightRules {
    /// Per-kind overrides.
    pub kinds: HashMap<InputKind, KindRule>,

    /// Rule for kinds without an override.
    pub fallback: KindRule,

    /// Windows closer than this are merged.
    pub merge_gap_secs: f64,

    /// Longer windows are split.
    pub max_duration_secs: f64,
}

impl Default for HighlightRules {
    fn default() -> Self {
        let kinds = HashMap::from([
            (InputKind::Kill, KindRule::new(5.0, 3.0, 1.0)),
            (InputKind::Knocked, KindRule::new(4.0, 2.0, 0.5)),
            (InputKind::BestKill, KindRule::new(6.0, 3.0, 2.0)),
            (InputKind::Elimination, KindRule::new(5.0, 3.0, 1.0)),
            (InputKind::Death, KindRule::new(5.0, 2.0, 0.5)),
            (InputKind::PlayerKnocked, KindRule::new(4.0, 2.0, 0.5)),
            (InputKind::Victory, KindRule::new(10.0, 5.0, 3.0)),
            (InputKind::Defeat, KindRule::new(5.0, 3.0, 0.5)),
        ]);
        Self {
            kinds,
            fallback: KindRule::new(4.0, 2.0, 0.5),
            merge_gap_secs: 3.0,
            max_duration_secs: 60.0,
        }
    }
}

impl HighlightRules {
    /// Rule for `kind`.
    pub fn rule(&self, kind: InputKind) -> KindRule {
        self.kinds.get(&kind).copied().unwrap_or(self.fallback)
    }

    /// Score of one event.
    pub fn score(&self, event: &InputEvent) -> f64 {
        self.rule(event.kind).weight * f64::from(event.count.max(1))
    }

    /// Reject negative paddings and non-positive lengths.
    pub fn validate(&self) -> RealtimeResult<()> {
        let rules = self.kinds.values().chain(std::iter::once(&self.fallback));
        for rule in rules {
            if !(rule.pre_secs >= 0.0 && rule.post_secs >= 0.0) {
                return Err(RealtimeError::InvalidConfig(format!(
                    "padding must not be negative ({rule:?})"
                )));
            }
        }
        if !(self.merge_gap_secs >= 0.0) {
            return Err(RealtimeError::InvalidConfig(
                "merge gap must not be negative".to_string(),
            ));
        }
        if !(self.max_duration_secs > 0.0) {
            return Err(RealtimeError::InvalidConfig(
                "max duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A time range worth keeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightWindow {
    /// Start in recording seconds.
    pub start: f64,

    /// End in recording seconds.
    pub end: f64,

    /// Inputs inside the window, in time order.
    pub inputs: Vec<InputEvent>,

    /// Sum of input scores.
    pub score: f64,
}

impl HighlightWindow {
    /// Window length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Turn inputs into merged, length-capped windows sorted by start.
///
/// Inputs that cannot anchor a highlight are ignored.
pub fn derive_highlights(events: &[InputEvent], rules: &HighlightRules) -> Vec<HighlightWindow> {
    let mut events: Vec<&InputEvent> = events
        .iter()
        .filter(|e| e.kind.is_highlight() && e.timestamp_secs.is_finite())
        .collect();
    events.sort_by(|a, b| a.timestamp_secs.total_cmp(&b.timestamp_secs));

    let mut merged: Vec<HighlightWindow> = Vec::new();
    for event in events {
        let rule = rules.rule(event.kind);
        let start = (event.timestamp_secs - rule.pre_secs).max(0.0);
        let end = event.timestamp_secs + rule.post_secs;
        let score = rules.score(event);

        match merged.last_mut() {
            Some(last) if start <= last.end + rules.merge_gap_secs => {
                last.start = last.start.min(start);
                last.end = last.end.max(end);
                last.inputs.push(event.clone());
                last.score += score;
            }
            _ => merged.push(HighlightWindow {
                start,
                end,
                inputs: vec![event.clone()],
                score,
            }),
        }
    }

    let windows: Vec<HighlightWindow> = merged
        .into_iter()
        .flat_map(|w| split_window(w, rules))
        .collect();
    debug!(windows = windows.len(), "Derived highlights");
    windows
}

/// Cut an overlong window into equal pieces, keeping pieces with inputs.
fn split_window(window: HighlightWindow, rules: &HighlightRules) -> Vec<HighlightWindow> {
    let max = rules.max_duration_secs;
    if !(max > 0.0) || window.duration() <= max {
        return vec![window];
    }

    let pieces = (window.duration() / max).ceil() as usize;
    let length = window.duration() / pieces as f64;
    let mut out: Vec<HighlightWindow> = (0..pieces)
        .map(|i| HighlightWindow {
            start: window.start + length * i as f64,
            end: window.start + length * (i + 1) as f64,
            inputs: Vec::new(),
            score: 0.0,
        })
        .collect();

    for input in window.inputs {
        let offset = input.timestamp_secs - window.start;
        let index = ((offset / length).floor().max(0.0) as usize).min(pieces - 1);
        out[index].score += rules.score(&input);
        out[index].inputs.push(input);
    }

    out.retain(|w| !w.inputs.is_empty());
    out
}
