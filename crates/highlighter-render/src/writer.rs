//! Encoding rendered frames with ffmpeg.

use std::ffi::OsString;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Stdio};
use std::thread::JoinHandle;

use tracing::{debug, info, instrument, warn};

use crate::error::RenderError;
use crate::ffmpeg::{check_status, display_args, drain_stderr, join_stderr, seconds_arg, FfmpegPaths};
use crate::filters::{escape_filter_value, FilterChain};
use crate::frame::Frame;
use crate::{FrameSink, RenderResult, WriterConfig, FADE_OUT_SECS};

/// AAC bitrate of the output.
const AUDIO_BITRATE: &str = "128k";

/// Pipes raw RGBA frames into an encoding ffmpeg process.
pub struct FfmpegFrameWriter {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    stderr: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frames_written: u64,
    output: PathBuf,
}

impl FfmpegFrameWriter {
    /// Spawn the encoder.
    #[instrument(skip(paths, config), fields(output = %config.output.display()))]
    pub fn spawn(paths: &FfmpegPaths, config: &WriterConfig) -> RenderResult<Self> {
        let args = Self::args(config);
        debug!(args = %display_args(&args), "Spawning encoder");

        let mut child = paths
            .ffmpeg_command()
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RenderError::Ffmpeg(format!("Failed to spawn encoder: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RenderError::Ffmpeg("encoder stdin not captured".to_string()))?;
        let stderr = drain_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdin: Some(BufWriter::new(stdin)),
            stderr,
            width: config.width,
            height: config.height,
            frames_written: 0,
            output: config.output.clone(),
        })
    }

    /// Encoder arguments after the global options.
    pub fn args(config: &WriterConfig) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));

        push(&["-f", "rawvideo", "-pix_fmt", "rgba"]);
        push(&["-s", &format!("{}x{}", config.width, config.height)]);
        push(&["-r", &config.fps.to_string(), "-i", "-"]);

        if let Some(audio) = &config.audio {
            args.push("-i".into());
            args.push(audio.clone().into_os_string());
        }

        let duration = config.duration_secs();
        let fade_start = seconds_arg(duration - FADE_OUT_SECS);
        let fade = format!("t=out:st={fade_start}:d={FADE_OUT_SECS}");

        let mut video = FilterChain::new();
        if let Some(subtitles) = &config.subtitles {
            let escaped = escape_filter_value(&subtitles.to_string_lossy());
            video.push("subtitles", format!("'{escaped}'"));
        }
        if duration > FADE_OUT_SECS {
            video.push("fade", &fade);
        }
        video.push("format", "yuv420p");

        let mut push = |values: &[&str]| args.extend(values.iter().map(OsString::from));
        push(&["-map", "0:v:0", "-vf", &video.to_string()]);
        push(&["-c:v", "libx264", "-preset", config.preset.x264_preset()]);
        push(&["-crf", &config.preset.crf().to_string()]);

        if config.audio.is_some() {
            push(&["-map", "1:a:0"]);
            if duration > FADE_OUT_SECS {
                push(&["-af", &format!("afade={fade}")]);
            }
            push(&["-c:a", "aac", "-b:a", AUDIO_BITRATE, "-shortest"]);
        }

        push(&["-movflags", "+faststart", "-y"]);
        args.push(config.output.clone().into_os_string());
        args
    }

    fn stdin(&mut self) -> RenderResult<&mut BufWriter<ChildStdin>> {
        self.stdin
            .as_mut()
            .ok_or_else(|| RenderError::Ffmpeg("encoder input already closed".to_string()))
    }
}

impl FrameSink for FfmpegFrameWriter {
    fn write_frame(&mut self, frame: &Frame) -> RenderResult<()> {
        if frame.dimensions() != (self.width, self.height) || !frame.is_valid() {
            return Err(RenderError::InvalidFrame(format!(
                "expected {}x{}, got {}x{} ({} bytes)",
                self.width,
                self.height,
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }

        if let Err(e) = self.stdin()?.write_all(&frame.data) {
            // A broken pipe means ffmpeg died; its stderr says why.
            self.stdin = None;
            let _ = self.child.wait();
            let stderr = join_stderr(self.stderr.take());
            return Err(RenderError::Ffmpeg(format!("{e}: {stderr}")));
        }
        self.frames_written += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn finish(mut self: Box<Self>) -> RenderResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let status = self.child.wait()?;
        check_status(status, join_stderr(self.stderr.take()))?;
        info!(
            output = %self.output.display(),
            frames = self.frames_written,
            "Encoder finished"
        );
        Ok(())
    }

    fn abort(mut self: Box<Self>) {
        self.stdin = None;
        if let Err(e) = self.child.kill() {
            warn!(error = %e, "Failed to kill encoder");
        }
        let _ = self.child.wait();
        let _ = join_stderr(self.stderr.take());
        debug!(output = %self.output.display(), "Encoder aborted");
    }
}
