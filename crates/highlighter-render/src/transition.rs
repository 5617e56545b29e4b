//! CPU blending of RGBA frames across clip boundaries.

use bytes::Bytes;

use highlighter_ipc::TransitionKind;

use crate::error::RenderError;
use crate::frame::Frame;
use crate::RenderResult;

/// Blend `from` into `to` at `progress` (0.0 shows `from`, 1.0 shows `to`).
pub fn blend(kind: TransitionKind, from: &Frame, to: &Frame, progress: f32) -> RenderResult<Frame> {
    if from.dimensions() != to.dimensions() || !from.is_valid() || !to.is_valid() {
        return Err(RenderError::InvalidFrame(format!(
            "cannot blend {}x{} with {}x{}",
            from.width, from.height, to.width, to.height
        )));
    }

    let progress = progress.clamp(0.0, 1.0);
    let data = match kind {
        TransitionKind::None => {
            if progress < 0.5 {
                from.data.clone()
            } else {
                to.data.clone()
            }
        }
        TransitionKind::Fade => Bytes::from(crossfade(&from.data, &to.data, progress)),
        TransitionKind::FadeBlack => Bytes::from(dip_to_black(&from.data, &to.data, progress)),
        TransitionKind::WipeLeft => Bytes::from(wipe_left(from, to, progress)),
    };

    Ok(Frame::new(data, from.width, from.height))
}

fn mix(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 + (b as f32 - a as f32) * t).round() as u8
}

fn crossfade(from: &[u8], to: &[u8], t: f32) -> Vec<u8> {
    from.iter().zip(to).map(|(&a, &b)| mix(a, b, t)).collect()
}

fn dip_to_black(from: &[u8], to: &[u8], t: f32) -> Vec<u8> {
    // First half darkens `from`, second half brightens `to`.
    let (source, level) = if t < 0.5 {
        (from, 1.0 - t * 2.0)
    } else {
        (to, (t - 0.5) * 2.0)
    };

    source
        .chunks_exact(4)
        .flat_map(|px| {
            [
                mix(0, px[0], level),
                mix(0, px[1], level),
                mix(0, px[2], level),
                px[3],
            ]
        })
        .collect()
}

fn wipe_left(from: &Frame, to: &Frame, t: f32) -> Vec<u8> {
    let width = from.width as usize;
    let row_bytes = width * 4;
    let boundary = width - (width as f32 * t).round() as usize;
    let split = boundary.min(width) * 4;

    let mut out = Vec::with_capacity(from.data.len());
    for (a, b) in from
        .data
        .chunks_exact(row_bytes)
        .zip(to.data.chunks_exact(row_bytes))
    {
        out.extend_from_slice(&a[..split]);
        out.extend_from_slice(&b[split..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white() -> Frame {
        Frame::solid(4, 2, [255, 255, 255, 255])
    }

    fn red() -> Frame {
        Frame::solid(4, 2, [200, 0, 0, 255])
    }

    #[test]
    fn test_crossfade_midpoint() {
        let frame = blend(TransitionKind::Fade, &white(), &red(), 0.5).unwrap();
        assert_eq!(&frame.data[..4], &[228, 128, 128, 255]);
    }

    #[test]
    fn test_crossfade_endpoints() {
        let start = blend(TransitionKind::Fade, &white(), &red(), 0.0).unwrap();
        let end = blend(TransitionKind::Fade, &white(), &red(), 1.0).unwrap();
        assert_eq!(start, white());
        assert_eq!(end, red());
    }

    #[test]
    fn test_dip_to_black_is_black_at_midpoint() {
        let frame = blend(TransitionKind::FadeBlack, &white(), &red(), 0.5).unwrap();
        assert_eq!(&frame.data[..4], &[0, 0, 0, 255]);
        let late = blend(TransitionKind::FadeBlack, &white(), &red(), 1.0).unwrap();
        assert_eq!(late, red());
    }

    #[test]
    fn test_wipe_left_splits_columns() {
        let frame = blend(TransitionKind::WipeLeft, &white(), &red(), 0.5).unwrap();
        // Left two columns keep `from`, right two show `to`.
        assert_eq!(&frame.data[..8], &[255, 255, 255, 255, 255, 255, 255, 255]);
        assert_eq!(&frame.data[8..16], &[200, 0, 0, 255, 200, 0, 0, 255]);
    }

    #[test]
    fn test_mismatched_dimensions_rejected() {
        let small = Frame::black(2, 2);
        assert!(matches!(
            blend(TransitionKind::Fade, &small, &red(), 0.5),
            Err(RenderError::InvalidFrame(_))
        ));
    }
}
