//! YouTube chapter list.

use crate::marker::{sorted, Marker};

/// Minimum spacing YouTube accepts between chapters.
pub const MIN_CHAPTER_SECS: u64 = 10;

const INTRO_TITLE: &str = "Intro";

/// Build the chapter text for `markers`.
///
/// The list always opens at `0:00`; chapters closer than
/// [`MIN_CHAPTER_SECS`] to the previous kept chapter are dropped.
pub fn export_youtube_chapters(markers: &[Marker]) -> String {
    let mut chapters: Vec<(u64, &str)> = Vec::new();

    for marker in sorted(markers) {
        let start = if marker.start_secs.is_finite() && marker.start_secs > 0.0 {
            marker.start_secs.floor() as u64
        } else {
            0
        };
        let title = marker.name.trim();
        let title = if title.is_empty() { "Highlight" } else { title };

        match chapters.last() {
            None if start > 0 => {
                chapters.push((0, INTRO_TITLE));
                if start >= MIN_CHAPTER_SECS {
                    chapters.push((start, title));
                }
            }
            None => chapters.push((0, title)),
            Some(&(previous, _)) if start >= previous + MIN_CHAPTER_SECS => {
                chapters.push((start, title))
            }
            Some(_) => {}
        }
    }

    if chapters.is_empty() {
        chapters.push((0, INTRO_TITLE));
    }

    let mut out = String::new();
    for (start, title) in chapters {
        out.push_str(&format_timestamp(start));
        out.push(' ');
        out.push_str(&title.replace(['\r', '\n'], " "));
        out.push('\n');
    }
    out
}

/// `M:SS` below one hour, `H:MM:SS` from one hour on.
pub fn format_timestamp(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_is_intro_only() {
        assert_eq!(export_youtube_chapters(&[]), "0:00 Intro\n");
    }

    #[test]
    fn test_intro_inserted_before_late_first_chapter() {
        let markers = vec![Marker::new("Kill", 42.7), Marker::new("Victory", 3725.0)];
        assert_eq!(
            export_youtube_chapters(&markers),
            "0:00 Intro\n0:42 Kill\n1:02:05 Victory\n"
        );
    }

    #[test]
    fn test_marker_at_zero_replaces_intro() {
        let markers = vec![Marker::new("Deploy", 0.4), Marker::new("Kill", 30.0)];
        assert_eq!(export_youtube_chapters(&markers), "0:00 Deploy\n0:30 Kill\n");
    }

    #[test]
    fn test_close_chapters_dropped() {
        let markers = vec![
            Marker::new("Kill", 5.0),
            Marker::new("Knock", 12.0),
            Marker::new("Kill", 15.0),
            Marker::new("Death", 22.0),
        ];
        assert_eq!(
            export_youtube_chapters(&markers),
            "0:00 Intro\n0:12 Knock\n0:22 Death\n"
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(599), "9:59");
        assert_eq!(format_timestamp(3600), "1:00:00");
    }
}
