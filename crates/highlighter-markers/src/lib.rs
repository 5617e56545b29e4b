//! Marker metadata export for non-linear editors.
//!
//! Converts timestamped highlight markers into timecode-based text formats:
//! a marker EDL, a marker CSV and a YouTube chapter list.

mod chapters;
mod csv;
mod edl;
mod error;
mod marker;
mod timecode;

pub use chapters::{export_youtube_chapters, format_timestamp, MIN_CHAPTER_SECS};
pub use csv::export_csv;
pub use edl::export_edl;
pub use error::MarkerError;
pub use marker::{Marker, MarkerColor};
pub use timecode::{nominal_rate, seconds_to_frames, Timecode};

use std::path::Path;

use highlighter_ipc::MarkerFormat;
use tracing::{debug, instrument};

/// Result type for marker operations.
pub type MarkerResult<T> = Result<T, MarkerError>;

/// Render `markers` in the requested format.
pub fn export_markers(
    format: MarkerFormat,
    title: &str,
    markers: &[Marker],
    fps: f64,
) -> MarkerResult<String> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(MarkerError::InvalidFrameRate(fps));
    }

    Ok(match format {
        MarkerFormat::Edl => export_edl(title, markers, fps),
        MarkerFormat::Csv => export_csv(markers, fps),
        MarkerFormat::YoutubeChapters => export_youtube_chapters(markers),
    })
}

/// Render `markers` and write them to `path`.
#[instrument(skip(markers), fields(count = markers.len()))]
pub fn write_markers(
    path: &Path,
    format: MarkerFormat,
    title: &str,
    markers: &[Marker],
    fps: f64,
) -> MarkerResult<()> {
    let text = export_markers(format, title, markers, fps)?;
    std::fs::write(path, text)?;
    debug!(path = %path.display(), "Markers written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_rejects_bad_fps() {
        let result = export_markers(MarkerFormat::Csv, "t", &[], f64::INFINITY);
        assert!(matches!(result, Err(MarkerError::InvalidFrameRate(_))));
    }

    #[test]
    fn test_write_markers_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.txt");
        let markers = vec![Marker::new("Kill", 75.0)];

        write_markers(&path, MarkerFormat::YoutubeChapters, "t", &markers, 30.0).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "0:00 Intro\n1:15 Kill\n");
    }
}
