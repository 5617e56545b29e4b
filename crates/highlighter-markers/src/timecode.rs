//! Non-drop-frame SMPTE timecode arithmetic.

use std::fmt;

use crate::error::MarkerError;
use crate::MarkerResult;

/// A frame-accurate position at a nominal integer frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timecode {
    frames: u64,
    rate: u32,
}

/// Nominal (integer) frame rate used for timecode labels.
///
/// 29.97 labels as 30, 59.94 as 60. Anything below one frame per second or
/// not finite falls back to 1.
pub fn nominal_rate(fps: f64) -> u32 {
    let rounded = fps.round();
    if rounded.is_finite() && rounded >= 1.0 {
        rounded as u32
    } else {
        1
    }
}

/// Whole frames covered by `secs` at `fps`, clamped to zero.
pub fn seconds_to_frames(secs: f64, fps: f64) -> u64 {
    if !secs.is_finite() || secs <= 0.0 || !fps.is_finite() || fps <= 0.0 {
        return 0;
    }
    (secs * fps).round() as u64
}

impl Timecode {
    /// Timecode for an absolute frame count.
    pub fn from_frames(frames: u64, fps: f64) -> Self {
        Self {
            frames,
            rate: nominal_rate(fps),
        }
    }

    /// Timecode for a position in seconds. Negative input clamps to zero.
    pub fn from_seconds(secs: f64, fps: f64) -> Self {
        Self::from_frames(seconds_to_frames(secs, fps), fps)
    }

    /// Parse `HH:MM:SS:FF` (a `;` frame separator is accepted too).
    pub fn parse(text: &str, fps: f64) -> MarkerResult<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MarkerError::InvalidFrameRate(fps));
        }
        let rate = nominal_rate(fps);
        let invalid = || MarkerError::InvalidTimecode(text.to_string());

        let parts: Vec<&str> = text.trim().split(|c| c == ':' || c == ';').collect();
        if parts.len() != 4 {
            return Err(invalid());
        }

        let mut fields = [0u64; 4];
        for (field, part) in fields.iter_mut().zip(&parts) {
            *field = part.parse().map_err(|_| invalid())?;
        }
        let [hours, minutes, seconds, frames] = fields;

        if minutes >= 60 || seconds >= 60 || frames >= rate as u64 {
            return Err(invalid());
        }

        let total = hours
            .checked_mul(3600)
            .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
            .and_then(|secs| secs.checked_mul(rate as u64))
            .and_then(|count| count.checked_add(frames))
            .ok_or_else(invalid)?;
        Ok(Self {
            frames: total,
            rate,
        })
    }

    /// Absolute frame count.
    pub fn total_frames(&self) -> u64 {
        self.frames
    }

    /// Nominal frame rate of the label.
    pub fn rate(&self) -> u32 {
        self.rate
    }

    /// Timecode `frames` later.
    pub fn add_frames(self, frames: u64) -> Self {
        Self {
            frames: self.frames.saturating_add(frames),
            rate: self.rate,
        }
    }

    /// Split into (hours, minutes, seconds, frames).
    pub fn components(&self) -> (u64, u64, u64, u64) {
        let rate = self.rate as u64;
        let frames = self.frames % rate;
        let total_seconds = self.frames / rate;
        (
            total_seconds / 3600,
            (total_seconds / 60) % 60,
            total_seconds % 60,
            frames,
        )
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (h, m, s, fr) = self.components();
        write!(f, "{h:02}:{m:02}:{s:02}:{fr:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_seconds_formats() {
        assert_eq!(Timecode::from_seconds(0.0, 30.0).to_string(), "00:00:00:00");
        assert_eq!(Timecode::from_seconds(5.5, 30.0).to_string(), "00:00:05:15");
        assert_eq!(Timecode::from_seconds(3661.0, 60.0).to_string(), "01:01:01:00");
    }

    #[test]
    fn test_negative_seconds_clamp_to_zero() {
        assert_eq!(Timecode::from_seconds(-3.0, 30.0).total_frames(), 0);
    }

    #[test]
    fn test_fractional_rates_use_nominal_label() {
        assert_eq!(nominal_rate(29.97), 30);
        assert_eq!(nominal_rate(59.94), 60);
        assert_eq!(nominal_rate(0.0), 1);
        assert_eq!(nominal_rate(f64::NAN), 1);
    }

    #[test]
    fn test_parse() {
        let tc = Timecode::parse("00:01:02:03", 30.0).unwrap();
        assert_eq!(tc.total_frames(), (62 * 30) + 3);
        assert_eq!(tc.to_string(), "00:01:02:03");

        let drop_sep = Timecode::parse("00:00:01;10", 30.0).unwrap();
        assert_eq!(drop_sep.total_frames(), 40);
    }

    #[test]
    fn test_parse_rejects_bad_fields() {
        assert!(Timecode::parse("00:00:00:30", 30.0).is_err());
        assert!(Timecode::parse("00:61:00:00", 30.0).is_err());
        assert!(Timecode::parse("00:00:00", 30.0).is_err());
        assert!(Timecode::parse("aa:00:00:00", 30.0).is_err());
        assert!(matches!(
            Timecode::parse("00:00:00:00", 0.0),
            Err(MarkerError::InvalidFrameRate(_))
        ));
    }

    #[test]
    fn test_parse_huge_hours_is_invalid() {
        assert!(matches!(
            Timecode::parse("18446744073709551615:00:00:00", 30.0),
            Err(MarkerError::InvalidTimecode(_))
        ));
        assert!(matches!(
            Timecode::parse("614891469123651720:00:00:00", 60.0),
            Err(MarkerError::InvalidTimecode(_))
        ));
    }

    #[test]
    fn test_add_frames_rolls_over() {
        let tc = Timecode::from_frames(29, 30.0).add_frames(1);
        assert_eq!(tc.to_string(), "00:00:01:00");
    }
}
