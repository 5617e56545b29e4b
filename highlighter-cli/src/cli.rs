//! Command line definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use highlighter_ipc::{ClipSource, Fps, MarkerFormat, Preset, Resolution, TransitionKind};

#[derive(Parser, Debug)]
#[command(name = "highlighter", author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "HIGHLIGHTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Clip library file, overriding the configured one
    #[arg(long, global = true)]
    pub library: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage the clip library
    Clips {
        #[command(subcommand)]
        action: ClipsAction,
    },

    /// Write marker metadata for a collection
    Markers {
        /// Marker format
        #[arg(short, long, value_enum, default_value_t = MarkerFormatArg::Edl)]
        format: MarkerFormatArg,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// Stream collection (global list when omitted)
        #[arg(short, long)]
        stream: Option<String>,

        /// Timecode frame rate
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },

    /// Render the enabled clips to a video file
    Export(ExportArgs),

    /// Derive highlight windows from a recorded event list and print them
    Highlights {
        /// JSON array of input events
        #[arg(short, long)]
        events: PathBuf,

        /// Print compact JSON
        #[arg(long)]
        compact: bool,
    },

    /// Simulate realtime detection against a scripted event list
    Realtime {
        /// JSON array of input events
        #[arg(short, long)]
        events: PathBuf,

        /// Recording used as the replay buffer contents
        #[arg(short, long)]
        replay: PathBuf,

        /// Stream collection receiving the clips
        #[arg(short, long, default_value = "live")]
        stream: String,

        /// Wall seconds per recording second
        #[arg(long, default_value_t = 0.05)]
        time_scale: f64,

        /// Directory for the saved replays (next to the recording by default)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

/// Overrides applied on top of the configured export settings.
#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Destination video file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Stream collection (global list when omitted)
    #[arg(short, long)]
    pub stream: Option<String>,

    #[arg(long, value_enum)]
    pub resolution: Option<ResolutionArg>,

    #[arg(long, value_enum)]
    pub fps: Option<FpsArg>,

    #[arg(long, value_enum)]
    pub preset: Option<PresetArg>,

    #[arg(long, value_enum)]
    pub transition: Option<TransitionArg>,

    /// Transition length in seconds
    #[arg(long)]
    pub transition_secs: Option<f64>,

    /// Render 9:16 instead of 16:9
    #[arg(long)]
    pub vertical: bool,

    /// Background music file
    #[arg(long)]
    pub music: Option<PathBuf>,

    /// Background music volume (0 - 100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub music_volume: Option<u8>,

    /// Clip or image played first
    #[arg(long)]
    pub intro: Option<PathBuf>,

    /// Clip or image played last
    #[arg(long)]
    pub outro: Option<PathBuf>,

    /// SRT file burned into the video
    #[arg(long)]
    pub subtitles: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum ClipsAction {
    /// List clips in order
    List {
        #[arg(short, long)]
        stream: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Add clip files
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long)]
        stream: Option<String>,

        #[arg(long, value_enum, default_value_t = SourceArg::Manual)]
        source: SourceArg,
    },

    /// Set the seconds cut from each end
    Trim {
        path: PathBuf,

        #[arg(long, default_value_t = 0.0)]
        start: f64,

        #[arg(long, default_value_t = 0.0)]
        end: f64,
    },

    /// Include a clip in exports
    Enable { path: PathBuf },

    /// Exclude a clip from exports
    Disable { path: PathBuf },

    /// Put clips in the given order
    Reorder {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[arg(short, long)]
        stream: Option<String>,
    },

    /// Remove a clip
    Remove { path: PathBuf },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerFormatArg {
    Edl,
    Csv,
    Chapters,
}

impl From<MarkerFormatArg> for MarkerFormat {
    fn from(arg: MarkerFormatArg) -> Self {
        match arg {
            MarkerFormatArg::Edl => Self::Edl,
            MarkerFormatArg::Csv => Self::Csv,
            MarkerFormatArg::Chapters => Self::YoutubeChapters,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionArg {
    #[value(name = "720")]
    R720,
    #[value(name = "1080")]
    R1080,
    #[value(name = "1440")]
    R1440,
    #[value(name = "2160")]
    R2160,
}

impl From<ResolutionArg> for Resolution {
    fn from(arg: ResolutionArg) -> Self {
        match arg {
            ResolutionArg::R720 => Self::R720,
            ResolutionArg::R1080 => Self::R1080,
            ResolutionArg::R1440 => Self::R1440,
            ResolutionArg::R2160 => Self::R2160,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpsArg {
    #[value(name = "30")]
    F30,
    #[value(name = "60")]
    F60,
}

impl From<FpsArg> for Fps {
    fn from(arg: FpsArg) -> Self {
        match arg {
            FpsArg::F30 => Self::F30,
            FpsArg::F60 => Self::F60,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetArg {
    Ultrafast,
    Fast,
    Slow,
}

impl From<PresetArg> for Preset {
    fn from(arg: PresetArg) -> Self {
        match arg {
            PresetArg::Ultrafast => Self::Ultrafast,
            PresetArg::Fast => Self::Fast,
            PresetArg::Slow => Self::Slow,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionArg {
    None,
    Fade,
    FadeBlack,
    WipeLeft,
}

impl From<TransitionArg> for TransitionKind {
    fn from(arg: TransitionArg) -> Self {
        match arg {
            TransitionArg::None => Self::None,
            TransitionArg::Fade => Self::Fade,
            TransitionArg::FadeBlack => Self::FadeBlack,
            TransitionArg::WipeLeft => Self::WipeLeft,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceArg {
    Manual,
    ReplayBuffer,
}

impl From<SourceArg> for ClipSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Manual => Self::Manual,
            SourceArg::ReplayBuffer => Self::ReplayBuffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_export_flags() {
        let args = Args::try_parse_from([
            "highlighter",
            "export",
            "-o",
            "out.mp4",
            "--resolution",
            "720",
            "--fps",
            "60",
            "--vertical",
            "--transition",
            "fade-black",
        ])
        .unwrap();

        match args.command {
            Commands::Export(export) => {
                assert_eq!(export.output, PathBuf::from("out.mp4"));
                assert_eq!(export.resolution, Some(ResolutionArg::R720));
                assert_eq!(export.fps, Some(FpsArg::F60));
                assert!(export.vertical);
                assert_eq!(export.transition, Some(TransitionArg::FadeBlack));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_markers_format_maps_to_chapters() {
        let args =
            Args::try_parse_from(["highlighter", "markers", "-f", "chapters", "-o", "c.txt"])
                .unwrap();
        match args.command {
            Commands::Markers { format, fps, .. } => {
                assert_eq!(MarkerFormat::from(format), MarkerFormat::YoutubeChapters);
                assert_eq!(fps, 30.0);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_music_volume_range_checked() {
        let result = Args::try_parse_from([
            "highlighter",
            "export",
            "-o",
            "out.mp4",
            "--music-volume",
            "150",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbose_and_quiet_conflict() {
        let result = Args::try_parse_from(["highlighter", "-v", "-q", "clips", "list"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_clips_add_requires_paths() {
        assert!(Args::try_parse_from(["highlighter", "clips", "add"]).is_err());
        let args = Args::try_parse_from(["highlighter", "clips", "add", "a.mp4", "b.mp4"]).unwrap();
        match args.command {
            Commands::Clips {
                action: ClipsAction::Add { paths, source, .. },
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(ClipSource::from(source), ClipSource::Manual);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
