//! Engine state machine types.

use serde::{Deserialize, Serialize};

/// The current state of the highlighter engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum HighlighterState {
    /// Nothing running.
    #[default]
    Idle,

    /// Watching vision events while the replay buffer records.
    Detecting,

    /// Rendering an export.
    Exporting {
        /// Current export phase.
        phase: ExportPhase,
    },

    /// The last operation failed.
    Error {
        /// Error message.
        message: String,

        /// Whether recovery is possible.
        recoverable: bool,
    },
}

impl HighlighterState {
    /// Returns true if the engine is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if an export is running.
    pub fn is_exporting(&self) -> bool {
        matches!(self, Self::Exporting { .. })
    }

    /// Returns true if realtime detection is running.
    pub fn is_detecting(&self) -> bool {
        matches!(self, Self::Detecting)
    }

    /// Returns true if the engine is in an error state.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Detecting => "Detecting",
            Self::Exporting { .. } => "Exporting",
            Self::Error { .. } => "Error",
        }
    }
}

/// Export phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportPhase {
    /// Mixing clip audio and music into a temporary track.
    PrepareAudio,

    /// Spawning the encoder.
    OpenWriter,

    /// Streaming frames into the encoder.
    RenderFrames,

    /// Waiting for the encoder to finish the file.
    Finalize,
}

impl ExportPhase {
    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::PrepareAudio => Some(Self::OpenWriter),
            Self::OpenWriter => Some(Self::RenderFrames),
            Self::RenderFrames => Some(Self::Finalize),
            Self::Finalize => None,
        }
    }

    /// Returns the previous phase, if any (for rollback).
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::PrepareAudio => None,
            Self::OpenWriter => Some(Self::PrepareAudio),
            Self::RenderFrames => Some(Self::OpenWriter),
            Self::Finalize => Some(Self::RenderFrames),
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::PrepareAudio => "Mixing audio",
            Self::OpenWriter => "Starting encoder",
            Self::RenderFrames => "Rendering frames",
            Self::Finalize => "Finalizing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_phase_order() {
        let mut phase = ExportPhase::PrepareAudio;
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            assert_eq!(next.previous(), Some(phase));
            phase = next;
            seen.push(phase);
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(phase, ExportPhase::Finalize);
    }

    #[test]
    fn test_state_predicates() {
        let state = HighlighterState::Exporting {
            phase: ExportPhase::RenderFrames,
        };
        assert!(state.is_exporting());
        assert!(!state.is_idle());
        assert_eq!(state.name(), "Exporting");
        assert!(HighlighterState::default().is_idle());
    }
}
