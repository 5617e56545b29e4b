//! Marker CSV in the column layout Premiere Pro imports.

use crate::marker::{sorted, Marker};
use crate::timecode::{seconds_to_frames, Timecode};

const HEADER: &str = "Marker Name,Description,In,Out,Duration,Marker Type";

/// Build the CSV text for `markers` at `fps`.
pub fn export_csv(markers: &[Marker], fps: f64) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    for marker in sorted(markers) {
        let start = Timecode::from_seconds(marker.start_secs, fps);
        let length = seconds_to_frames(marker.duration_secs, fps);
        let end = start.add_frames(length);
        let duration = Timecode::from_frames(length, fps);

        let row = [
            quote(&marker.name),
            quote(&marker.description),
            start.to_string(),
            end.to_string(),
            duration.to_string(),
            "Comment".to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }

    out
}

fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_only_when_empty() {
        assert_eq!(export_csv(&[], 30.0), format!("{HEADER}\n"));
    }

    #[test]
    fn test_row_layout() {
        let mut marker = Marker::new("Kill", 10.0).with_duration(1.5);
        marker.description = "Double kill".to_string();
        let csv = export_csv(&[marker], 30.0);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Kill,Double kill,00:00:10:00,00:00:11:15,00:00:01:15,Comment"
        );
    }

    #[test]
    fn test_fields_are_quoted() {
        let marker = Marker::new("Kill, \"clean\"", 0.0);
        let csv = export_csv(&[marker], 30.0);
        assert!(csv.contains("\"Kill, \"\"clean\"\"\","));
    }
}
