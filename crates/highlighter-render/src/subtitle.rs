//! SubRip subtitle tracks burned into exports.

use std::fmt::Write as _;
use std::path::Path;

use crate::error::RenderError;
use crate::RenderResult;

/// One subtitle cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleCue {
    /// Start in seconds.
    pub start: f64,

    /// End in seconds.
    pub end: f64,

    /// Cue text; may span lines.
    pub text: String,
}

/// An ordered list of cues.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleTrack {
    cues: Vec<SubtitleCue>,
}

impl SubtitleTrack {
    /// Build from cues, sorted by start.
    pub fn from_cues(mut cues: Vec<SubtitleCue>) -> Self {
        cues.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self { cues }
    }

    /// Cues in order.
    pub fn cues(&self) -> &[SubtitleCue] {
        &self.cues
    }

    /// Whether the track has no cues.
    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// Read and parse an `.srt` file.
    pub fn read_srt(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse_srt(&text)
    }

    /// Write the track as an `.srt` file.
    pub fn write_srt(&self, path: &Path) -> RenderResult<()> {
        std::fs::write(path, self.to_srt())?;
        Ok(())
    }

    /// Parse SubRip text. Blocks are separated by blank lines; the numeric
    /// index line is optional.
    pub fn parse_srt(text: &str) -> RenderResult<Self> {
        let normalized = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let mut cues = Vec::new();

        for (number, block) in normalized
            .split("\n\n")
            .filter(|b| !b.trim().is_empty())
            .enumerate()
        {
            let cue = number + 1;
            let mut lines = block.trim().lines();
            let mut timing = lines.next().unwrap_or_default();
            if !timing.contains("-->") {
                timing = lines.next().unwrap_or_default();
            }

            let (start, end) = timing.split_once("-->").ok_or_else(|| RenderError::Subtitles {
                cue,
                message: "missing timing line".to_string(),
            })?;
            let start = parse_srt_time(start.trim()).ok_or_else(|| RenderError::Subtitles {
                cue,
                message: format!("bad start time '{}'", start.trim()),
            })?;
            let end = parse_srt_time(end.trim()).ok_or_else(|| RenderError::Subtitles {
                cue,
                message: format!("bad end time '{}'", end.trim()),
            })?;
            if end < start {
                return Err(RenderError::Subtitles {
                    cue,
                    message: "cue ends before it starts".to_string(),
                });
            }

            cues.push(SubtitleCue {
                start,
                end,
                text: lines.collect::<Vec<_>>().join("\n"),
            });
        }

        Ok(Self::from_cues(cues))
    }

    /// Serialize as SubRip text.
    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (index, cue) in self.cues.iter().enumerate() {
            let _ = writeln!(out, "{}", index + 1);
            let _ = writeln!(
                out,
                "{} --> {}",
                format_srt_time(cue.start),
                format_srt_time(cue.end)
            );
            let _ = writeln!(out, "{}", cue.text);
            out.push('\n');
        }
        out
    }

    /// Move every cue by `offset` seconds, dropping cues that end before zero.
    pub fn shifted(&self, offset: f64) -> Self {
        let cues = self
            .cues
            .iter()
            .filter(|c| c.end + offset > 0.0)
            .map(|c| SubtitleCue {
                start: (c.start + offset).max(0.0),
                end: c.end + offset,
                text: c.text.clone(),
            })
            .collect();
        Self { cues }
    }
}

fn parse_srt_time(text: &str) -> Option<f64> {
    let (clock, millis) = text.split_once([',', '.'])?;
    let mut parts = clock.split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }
    // Fraction of a second; "5" means 500 ms
    if millis.is_empty() || millis.len() > 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let millis: u64 = format!("{millis:0<3}").parse().ok()?;
    Some(hours as f64 * 3600.0 + (minutes * 60 + seconds) as f64 + millis as f64 / 1000.0)
}

fn format_srt_time(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;
    format!(
        "{:02}:{:02}:{:02},{:03}",
        total_s / 3600,
        (total_s / 60) % 60,
        total_s % 60,
        ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1\r\n00:00:01,000 --> 00:00:02,500\r\nNice shot\r\n\r\n2\r\n00:01:00,250 --> 00:01:03,000\r\nTwo\r\nlines\r\n";

    #[test]
    fn test_parse_srt() {
        let track = SubtitleTrack::parse_srt(SAMPLE).unwrap();
        assert_eq!(track.cues().len(), 2);
        assert_eq!(track.cues()[0].start, 1.0);
        assert_eq!(track.cues()[0].end, 2.5);
        assert_eq!(track.cues()[1].start, 60.25);
        assert_eq!(track.cues()[1].text, "Two\nlines");
    }

    #[test]
    fn test_to_srt_normalizes_numbering() {
        let track = SubtitleTrack::from_cues(vec![
            SubtitleCue {
                start: 5.0,
                end: 6.0,
                text: "b".into(),
            },
            SubtitleCue {
                start: 0.0,
                end: 1.0,
                text: "a".into(),
            },
        ]);
        assert_eq!(
            track.to_srt(),
            "1\n00:00:00,000 --> 00:00:01,000\na\n\n2\n00:00:05,000 --> 00:00:06,000\nb\n\n"
        );
    }

    #[test]
    fn test_bad_timing_reports_cue() {
        let err = SubtitleTrack::parse_srt("1\n00:00:01,000 -> 00:00:02,000\nx\n").unwrap_err();
        assert!(matches!(err, RenderError::Subtitles { cue: 1, .. }));
    }

    #[test]
    fn test_short_fraction_is_padded() {
        assert_eq!(parse_srt_time("00:00:01,5"), Some(1.5));
        assert_eq!(parse_srt_time("00:00:01.25"), Some(1.25));
        assert_eq!(parse_srt_time("00:00:01,005"), Some(1.005));
        assert_eq!(parse_srt_time("00:00:01,5000"), None);
        assert_eq!(parse_srt_time("00:00:01,"), None);
        assert_eq!(parse_srt_time("00:00:01,-5"), None);
    }

    #[test]
    fn test_shifted_drops_early_cues() {
        let track = SubtitleTrack::parse_srt(SAMPLE).unwrap().shifted(-10.0);
        assert_eq!(track.cues().len(), 1);
        assert_eq!(track.cues()[0].start, 50.25);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reel.srt");
        let track = SubtitleTrack::parse_srt(SAMPLE).unwrap();

        track.write_srt(&path).unwrap();
        assert_eq!(SubtitleTrack::read_srt(&path).unwrap(), track);
        assert!(SubtitleTrack::read_srt(&dir.path().join("missing.srt")).is_err());
    }
}
