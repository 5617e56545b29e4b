//! The frame loop: decode, blend, encode.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use highlighter_ipc::TransitionKind;

use crate::error::RenderError;
use crate::frame::Frame;
use crate::timeline::{Timeline, TimelineEntry};
use crate::transition::blend;
use crate::{FrameSink, FrameSource, RenderResult};

/// A source plus the last frame it produced.
///
/// Sources that run short repeat their last frame so the output keeps the
/// planned length.
struct Track {
    source: Box<dyn FrameSource>,
    last: Option<Frame>,
    repeated: u64,
}

impl Track {
    fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            last: None,
            repeated: 0,
        }
    }

    fn pull(&mut self, width: u32, height: u32) -> RenderResult<Frame> {
        match self.source.next_frame()? {
            Some(frame) => {
                if frame.dimensions() != (width, height) {
                    return Err(RenderError::InvalidFrame(format!(
                        "source produced {}x{}, output is {width}x{height}",
                        frame.width, frame.height
                    )));
                }
                self.last = Some(frame.clone());
                Ok(frame)
            }
            None => {
                self.repeated += 1;
                Ok(self
                    .last
                    .clone()
                    .unwrap_or_else(|| Frame::black(width, height)))
            }
        }
    }
}

impl Drop for Track {
    fn drop(&mut self) {
        if self.repeated > 0 {
            warn!(repeated = self.repeated, "Source ran short, repeated its last frame");
        }
    }
}

/// Renders a planned timeline into a frame sink.
pub struct Renderer<'a> {
    timeline: &'a Timeline,
    transition: TransitionKind,
    width: u32,
    height: u32,
    cancel: &'a AtomicBool,
}

impl<'a> Renderer<'a> {
    pub fn new(
        timeline: &'a Timeline,
        transition: TransitionKind,
        (width, height): (u32, u32),
        cancel: &'a AtomicBool,
    ) -> Self {
        Self {
            timeline,
            transition,
            width,
            height,
            cancel,
        }
    }

    /// Pull every entry's frames in order and push them into `sink`.
    ///
    /// Sources are opened lazily through `open`, at most two at a time.
    /// `on_frame` receives the running frame count. Returns the number of
    /// frames written. The sink is left open for the caller to finish or
    /// abort.
    #[instrument(skip_all, fields(entries = self.timeline.entries.len(), total_frames = self.timeline.total_frames))]
    pub fn render<F, P>(&self, mut open: F, sink: &mut dyn FrameSink, mut on_frame: P) -> RenderResult<u64>
    where
        F: FnMut(&TimelineEntry) -> RenderResult<Box<dyn FrameSource>>,
        P: FnMut(u64),
    {
        let entries = &self.timeline.entries;
        let first = entries.first().ok_or(RenderError::NoClips)?;

        let mut written = 0u64;
        let mut emit = |frame: &Frame, sink: &mut dyn FrameSink| -> RenderResult<()> {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(RenderError::Cancelled);
            }
            sink.write_frame(frame)?;
            written += 1;
            on_frame(written);
            Ok(())
        };

        let mut current = Track::new(open(first)?);
        for (index, entry) in entries.iter().enumerate() {
            let out_frames = self.timeline.transition_out_frames(index);
            let solo = entry
                .frames
                .saturating_sub(entry.transition_in_frames)
                .saturating_sub(out_frames);
            debug!(
                path = %entry.clip.path.display(),
                solo,
                out_frames,
                "Rendering entry"
            );

            for _ in 0..solo {
                let frame = current.pull(self.width, self.height)?;
                emit(&frame, &mut *sink)?;
            }

            let Some(next_entry) = entries.get(index + 1) else {
                break;
            };
            let mut next = Track::new(open(next_entry)?);

            for k in 0..out_frames {
                let from = current.pull(self.width, self.height)?;
                let to = next.pull(self.width, self.height)?;
                let progress = (k + 1) as f32 / (out_frames + 1) as f32;
                let frame = blend(self.transition, &from, &to, progress)?;
                emit(&frame, &mut *sink)?;
            }
            current = next;
        }

        info!(frames = written, "Render complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StillFrameSource;
    use crate::timeline::{plan_timeline, TimelineClip};
    use highlighter_ipc::TransitionSettings;
    use std::path::PathBuf;

    #[derive(Default)]
    struct MemorySink {
        frames: Vec<Frame>,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &Frame) -> RenderResult<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.frames.len() as u64
        }

        fn finish(self: Box<Self>) -> RenderResult<()> {
            Ok(())
        }

        fn abort(self: Box<Self>) {}
    }

    fn clip(name: &str, secs: f64) -> TimelineClip {
        TimelineClip {
            path: PathBuf::from(name),
            title: name.to_string(),
            start_trim: 0.0,
            duration: secs,
            has_audio: false,
            is_still: false,
        }
    }

    fn colour_of(entry: &TimelineEntry) -> [u8; 4] {
        if entry.clip.path == PathBuf::from("red") {
            [200, 0, 0, 255]
        } else {
            [0, 0, 200, 255]
        }
    }

    fn timeline(transition: &TransitionSettings) -> Timeline {
        plan_timeline(&[clip("red", 1.0), clip("blue", 1.0)], 10, transition).unwrap()
    }

    #[test]
    fn test_crossfade_between_sources() {
        let timeline = timeline(&TransitionSettings {
            kind: TransitionKind::Fade,
            duration_secs: 0.3,
        });
        let cancel = AtomicBool::new(false);
        let renderer = Renderer::new(&timeline, TransitionKind::Fade, (2, 2), &cancel);

        let mut sink = MemorySink::default();
        let mut progress = Vec::new();
        let written = renderer
            .render(
                |entry| Ok(Box::new(StillFrameSource::solid(2, 2, colour_of(entry), entry.frames))),
                &mut sink,
                |n| progress.push(n),
            )
            .unwrap();

        assert_eq!(written, 17);
        assert_eq!(sink.frames.len(), 17);
        assert_eq!(progress.last(), Some(&17));
        assert_eq!(&sink.frames[0].data[..4], &[200, 0, 0, 255]);
        assert_eq!(&sink.frames[8].data[..4], &[100, 0, 100, 255]);
        assert_eq!(&sink.frames[16].data[..4], &[0, 0, 200, 255]);
    }

    #[test]
    fn test_short_source_repeats_last_frame() {
        let timeline = timeline(&TransitionSettings {
            kind: TransitionKind::None,
            duration_secs: 0.0,
        });
        let cancel = AtomicBool::new(false);
        let renderer = Renderer::new(&timeline, TransitionKind::None, (1, 1), &cancel);

        let mut sink = MemorySink::default();
        renderer
            .render(
                |entry| Ok(Box::new(StillFrameSource::solid(1, 1, colour_of(entry), 3))),
                &mut sink,
                |_| {},
            )
            .unwrap();

        assert_eq!(sink.frames.len(), 20);
        assert_eq!(&sink.frames[9].data[..], &[200, 0, 0, 255]);
        assert_eq!(&sink.frames[19].data[..], &[0, 0, 200, 255]);
    }

    #[test]
    fn test_cancel_stops_render() {
        let timeline = timeline(&TransitionSettings::default());
        let cancel = AtomicBool::new(false);
        let renderer = Renderer::new(&timeline, TransitionKind::Fade, (1, 1), &cancel);

        let mut sink = MemorySink::default();
        let result = renderer.render(
            |entry| Ok(Box::new(StillFrameSource::solid(1, 1, colour_of(entry), entry.frames))),
            &mut sink,
            |n| {
                if n == 5 {
                    cancel.store(true, Ordering::Relaxed);
                }
            },
        );

        assert!(matches!(result, Err(RenderError::Cancelled)));
        assert_eq!(sink.frames.len(), 5);
    }

    #[test]
    fn test_mismatched_source_rejected() {
        let timeline = timeline(&TransitionSettings::default());
        let cancel = AtomicBool::new(false);
        let renderer = Renderer::new(&timeline, TransitionKind::Fade, (4, 4), &cancel);

        let mut sink = MemorySink::default();
        let result = renderer.render(
            |_| Ok(Box::new(StillFrameSource::solid(2, 2, [0; 4], 10))),
            &mut sink,
            |_| {},
        );
        assert!(matches!(result, Err(RenderError::InvalidFrame(_))));
    }
}
