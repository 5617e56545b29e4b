//! Locating and spawning the ffmpeg binaries.

use std::env;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, ExitStatus};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::error::RenderError;
use crate::RenderResult;

/// Longest stderr tail kept for error messages.
const STDERR_TAIL_BYTES: usize = 4096;

/// Paths of the ffmpeg and ffprobe executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegPaths {
    /// ffmpeg executable.
    pub ffmpeg: PathBuf,

    /// ffprobe executable.
    pub ffprobe: PathBuf,
}

impl FfmpegPaths {
    /// Use explicit executables.
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Find the executables: `FFMPEG_PATH`/`FFPROBE_PATH` first, then `PATH`.
    ///
    /// When only ffmpeg is known, ffprobe is looked up next to it.
    pub fn discover() -> RenderResult<Self> {
        let ffmpeg = env::var_os("FFMPEG_PATH")
            .map(PathBuf::from)
            .or_else(|| find_in_path("ffmpeg"))
            .ok_or(RenderError::BinaryNotFound("ffmpeg"))?;

        let ffprobe = env::var_os("FFPROBE_PATH")
            .map(PathBuf::from)
            .or_else(|| sibling(&ffmpeg, "ffprobe").filter(|p| p.is_file()))
            .or_else(|| find_in_path("ffprobe"))
            .ok_or(RenderError::BinaryNotFound("ffprobe"))?;

        debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Found ffmpeg");
        Ok(Self { ffmpeg, ffprobe })
    }

    /// A command for ffmpeg with the banner and stdin prompts disabled.
    pub fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-hide_banner", "-nostdin", "-loglevel", "error"]);
        cmd
    }

    /// A command for ffprobe.
    pub fn ffprobe_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error"]);
        cmd
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

fn sibling(path: &Path, name: &str) -> Option<PathBuf> {
    path.parent().map(|dir| dir.join(executable_name(name)))
}

/// Search `PATH` for an executable.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    let file = executable_name(name);
    env::split_paths(&path)
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

/// Drain a child's stderr on a thread so the pipe never fills up.
///
/// The handle yields the last few KiB of output.
pub(crate) fn drain_stderr(stderr: Option<ChildStderr>) -> Option<JoinHandle<String>> {
    let mut stderr = stderr?;
    Some(thread::spawn(move || {
        let mut tail: Vec<u8> = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stderr.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&buf[..n]);
                    if tail.len() > STDERR_TAIL_BYTES * 2 {
                        tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                    }
                }
            }
        }
        let start = tail.len().saturating_sub(STDERR_TAIL_BYTES);
        String::from_utf8_lossy(&tail[start..]).trim().to_string()
    }))
}

/// Collect drained stderr text.
pub(crate) fn join_stderr(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Turn a non-zero exit into an error carrying stderr.
pub(crate) fn check_status(status: ExitStatus, stderr: String) -> RenderResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(RenderError::FfmpegExit {
            status: status.to_string(),
            stderr,
        })
    }
}

/// Render argument lists for logs.
pub(crate) fn display_args<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let joined = args
        .into_iter()
        .map(|a| a.as_ref().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    trace!(args = %joined, "ffmpeg arguments");
    joined
}

/// Seconds formatted for ffmpeg time options.
pub(crate) fn seconds_arg(secs: f64) -> String {
    format!("{:.3}", secs.max(0.0))
}
