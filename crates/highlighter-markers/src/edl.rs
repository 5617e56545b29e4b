//! CMX3600-style marker EDL.
//!
//! Each marker becomes one video event whose source and record ranges are
//! identical, followed by a comment line carrying colour, name and length in
//! frames. This is the shape DaVinci Resolve imports as timeline markers.

use std::fmt::Write as _;

use crate::marker::{sorted, Marker};
use crate::timecode::{seconds_to_frames, Timecode};

/// Build the EDL text for `markers` at `fps`.
pub fn export_edl(title: &str, markers: &[Marker], fps: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TITLE: {}", sanitize(title));
    let _ = writeln!(out, "FCM: NON-DROP FRAME");
    out.push('\n');

    for (index, marker) in sorted(markers).into_iter().enumerate() {
        let record_in = Timecode::from_seconds(marker.start_secs, fps);
        let length = seconds_to_frames(marker.duration_secs, fps).max(1);
        let record_out = record_in.add_frames(length);

        let _ = writeln!(
            out,
            "{:03}  001      V     C        {record_in} {record_out} {record_in} {record_out}",
            index + 1
        );
        let _ = writeln!(
            out,
            " |C:ResolveColor{} |M:{} |D:{}",
            marker.color.name(),
            sanitize(&marker.name),
            length
        );
        out.push('\n');
    }

    out
}

// Pipes delimit comment fields; newlines would end the event.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '|' => '/',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}
