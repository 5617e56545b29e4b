//! Media probing with ffprobe.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::RenderError;
use crate::ffmpeg::FfmpegPaths;
use crate::{Prober, RenderResult};

/// What ffprobe reports about a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    /// Container duration in seconds; `None` for still images.
    pub duration: Option<f64>,

    /// Video width in pixels.
    pub width: u32,

    /// Video height in pixels.
    pub height: u32,

    /// File has at least one audio stream.
    pub has_audio: bool,

    /// File is a single still image.
    pub is_still: bool,
}

/// [`Prober`] backed by the ffprobe binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    paths: FfmpegPaths,
}

impl FfprobeProber {
    pub fn new(paths: FfmpegPaths) -> Self {
        Self { paths }
    }
}

impl Prober for FfprobeProber {
    fn probe(&self, path: &Path) -> RenderResult<MediaInfo> {
        probe_media(&self.paths, path)
    }
}

/// Run ffprobe on `path`.
#[instrument(skip(paths), fields(path = %path.display()))]
pub fn probe_media(paths: &FfmpegPaths, path: &Path) -> RenderResult<MediaInfo> {
    if !path.exists() {
        return Err(RenderError::Probe {
            path: path.display().to_string(),
            message: "file not found".to_string(),
        });
    }

    let output = paths
        .ffprobe_command()
        .args(["-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| RenderError::Ffmpeg(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(RenderError::Probe {
            path: path.display().to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let info = parse_probe_output(path, &output.stdout)?;
    debug!(?info, "Probed media");
    Ok(info)
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(path: &Path, stdout: &[u8]) -> RenderResult<MediaInfo> {
    let fail = |message: &str| RenderError::Probe {
        path: path.display().to_string(),
        message: message.to_string(),
    };

    let json: Value = serde_json::from_slice(stdout).map_err(|e| fail(&e.to_string()))?;
    let streams = json["streams"].as_array().ok_or_else(|| fail("no streams"))?;

    let video = streams
        .iter()
        .find(|s| s["codec_type"] == "video")
        .ok_or_else(|| fail("no video stream"))?;
    let has_audio = streams.iter().any(|s| s["codec_type"] == "audio");

    let width = video["width"].as_u64().unwrap_or(0) as u32;
    let height = video["height"].as_u64().unwrap_or(0) as u32;

    let format_name = json["format"]["format_name"].as_str().unwrap_or_default();
    let is_still = format_name == "image2" || format_name.ends_with("_pipe");

    let duration = json["format"]["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0 && !is_still);

    if duration.is_none() && !is_still {
        return Err(fail("missing duration"));
    }

    Ok(MediaInfo {
        duration,
        width,
        height,
        has_audio,
        is_still,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIP_JSON: &str = r#"{
        "streams": [
            {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080},
            {"codec_type": "audio", "codec_name": "aac"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "31.466667"}
    }"#;

    #[test]
    fn test_parse_video_clip() {
        let info = parse_probe_output(Path::new("a.mp4"), CLIP_JSON.as_bytes()).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert!(info.has_audio);
        assert!(!info.is_still);
        assert!((info.duration.unwrap() - 31.466667).abs() < 1e-9);
    }

    #[test]
    fn test_parse_still_image() {
        let json = r#"{
            "streams": [{"codec_type": "video", "codec_name": "png", "width": 1280, "height": 720}],
            "format": {"format_name": "png_pipe", "duration": "0.040000"}
        }"#;
        let info = parse_probe_output(Path::new("splash.png"), json.as_bytes()).unwrap();
        assert!(info.is_still);
        assert!(!info.has_audio);
        assert_eq!(info.duration, None);
    }

    #[test]
    fn test_audio_only_is_rejected() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "3.0"}}"#;
        assert!(matches!(
            parse_probe_output(Path::new("a.mp3"), json.as_bytes()),
            Err(RenderError::Probe { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let prober = FfprobeProber::new(FfmpegPaths::new("ffmpeg", "ffprobe"));
        assert!(matches!(
            prober.probe_duration(Path::new("/definitely/not/here.mp4")),
            Err(RenderError::Probe { .. })
        ));
    }
}
