//! Application configuration loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use highlighter_engine::EngineConfig;
use highlighter_ipc::ExportSettings;
use highlighter_realtime::RealtimeConfig;
use highlighter_render::{find_in_path, FfmpegPaths};

/// Explicit ffmpeg executables; unset values are discovered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

impl FfmpegConfig {
    /// Executables to use, or `None` to discover both.
    pub fn paths(&self) -> Option<FfmpegPaths> {
        match (&self.ffmpeg, &self.ffprobe) {
            (None, None) => None,
            (ffmpeg, ffprobe) => Some(FfmpegPaths::new(
                ffmpeg.clone().unwrap_or_else(|| lookup("ffmpeg")),
                ffprobe.clone().unwrap_or_else(|| lookup("ffprobe")),
            )),
        }
    }
}

fn lookup(name: &str) -> PathBuf {
    find_in_path(name).unwrap_or_else(|| PathBuf::from(name))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// JSON clip library.
    pub path: PathBuf,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("highlights.json"),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ffmpeg: FfmpegConfig,
    pub export: ExportSettings,
    pub realtime: RealtimeConfig,
    pub library: LibraryConfig,
}

impl AppConfig {
    /// Load from `path`; no path or a missing file gives the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            debug!(path = %path.display(), "Config file missing, using defaults");
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.realtime.validate()?;
        Ok(config)
    }

    /// Engine settings, with an optional library override.
    pub fn engine_config(&self, library: Option<&Path>) -> EngineConfig {
        EngineConfig {
            export: self.export.clone(),
            realtime: self.realtime.clone(),
            library_path: Some(
                library
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.library.path.clone()),
            ),
            ..EngineConfig::default()
        }
    }
}
