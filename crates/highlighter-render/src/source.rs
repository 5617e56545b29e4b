//! Frame sources: ffmpeg decoders and repeated still frames.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout, Stdio};
use std::thread::JoinHandle;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use crate::error::RenderError;
use crate::ffmpeg::{check_status, display_args, drain_stderr, join_stderr, seconds_arg, FfmpegPaths};
use crate::filters::fit_chain;
use crate::frame::Frame;
use crate::{FrameSource, RenderResult, SourceConfig};

/// Decodes one clip to RGBA frames through an ffmpeg child process.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_count: u64,
    frames_read: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    /// Spawn the decoder.
    #[instrument(skip(paths, config), fields(path = %config.path.display()))]
    pub fn spawn(paths: &FfmpegPaths, config: &SourceConfig) -> RenderResult<Self> {
        let args = Self::args(config);
        debug!(args = %display_args(&args), "Spawning decoder");

        let mut child = paths
            .ffmpeg_command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Ffmpeg(format!("Failed to spawn decoder: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RenderError::Ffmpeg("decoder stdout not captured".to_string()))?;
        let stderr = drain_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdout,
            stderr,
            width: config.width,
            height: config.height,
            frame_count: config.frame_count,
            frames_read: 0,
            finished: false,
        })
    }

    /// Decoder arguments after the global options.
    pub fn args(config: &SourceConfig) -> Vec<OsString> {
        let filters = fit_chain(config.width, config.height, config.fps, config.orientation);
        let mut args: Vec<OsString> = vec![
            "-ss".into(),
            seconds_arg(config.start_secs).into(),
            "-t".into(),
            seconds_arg(config.duration_secs).into(),
            "-i".into(),
            config.path.clone().into_os_string(),
            "-vf".into(),
            filters.to_string().into(),
            "-an".into(),
        ];
        args.extend(
            ["-f", "rawvideo", "-pix_fmt", "rgba", "-"]
                .into_iter()
                .map(OsString::from),
        );
        args
    }

    fn finish_process(&mut self) -> RenderResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let status = self.child.wait()?;
        check_status(status, join_stderr(self.stderr.take()))
    }
}

impl FrameSource for FfmpegFrameSource {
    fn next_frame(&mut self) -> RenderResult<Option<Frame>> {
        if self.finished || self.frames_read >= self.frame_count {
            return Ok(None);
        }

        let mut buf = vec![0u8; Frame::rgba_buffer_size(self.width, self.height)];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => {
                self.frames_read += 1;
                Ok(Some(Frame::new(Bytes::from(buf), self.width, self.height)))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(
                    frames_read = self.frames_read,
                    expected = self.frame_count,
                    "Decoder ended early"
                );
                self.finish_process()?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            // The clip is usually longer than what we pull.
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Decode the first frame of an image or video, fitted to the output.
#[instrument(skip(paths, config), fields(path = %config.path.display()))]
pub fn decode_still(paths: &FfmpegPaths, config: &SourceConfig) -> RenderResult<Frame> {
    let filters = fit_chain(config.width, config.height, config.fps, config.orientation);
    let output = paths
        .ffmpeg_command()
        .arg("-i")
        .arg(&config.path)
        .args(["-frames:v", "1", "-vf"])
        .arg(filters.to_string())
        .args(["-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| RenderError::Ffmpeg(format!("Failed to spawn decoder: {e}")))?;

    check_status(
        output.status,
        String::from_utf8_lossy(&output.stderr).trim().to_string(),
    )?;

    let expected = Frame::rgba_buffer_size(config.width, config.height);
    if output.stdout.len() < expected {
        return Err(RenderError::InvalidFrame(format!(
            "{} decoded to {} bytes, expected {expected}",
            config.path.display(),
            output.stdout.len()
        )));
    }

    let mut data = output.stdout;
    data.truncate(expected);
    Ok(Frame::new(Bytes::from(data), config.width, config.height))
}

/// Repeats one frame a fixed number of times.
#[derive(Debug, Clone)]
pub struct StillFrameSource {
    frame: Frame,
    frame_count: u64,
    emitted: u64,
}

impl StillFrameSource {
    pub fn new(frame: Frame, frame_count: u64) -> Self {
        Self {
            frame,
            frame_count,
            emitted: 0,
        }
    }

    /// A solid colour card.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], frame_count: u64) -> Self {
        Self::new(Frame::solid(width, height, rgba), frame_count)
    }
}

impl FrameSource for StillFrameSource {
    fn next_frame(&mut self) -> RenderResult<Option<Frame>> {
        if self.emitted >= self.frame_count {
            return Ok(None);
        }
        self.emitted += 1;
        Ok(Some(self.frame.clone()))
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }
}

/// Open the right source for a clip.
pub(crate) fn open_source(
    paths: &FfmpegPaths,
    config: &SourceConfig,
) -> RenderResult<Box<dyn FrameSource>> {
    if config.is_still {
        let frame = match decode_still(paths, config) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(path = %config.path.display(), error = %e, "Still image unreadable, using black");
                Frame::black(config.width, config.height)
            }
        };
        Ok(Box::new(StillFrameSource::new(frame, config.frame_count)))
    } else {
        Ok(Box::new(FfmpegFrameSource::spawn(paths, config)?))
    }
}
