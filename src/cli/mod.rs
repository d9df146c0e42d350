use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::DEFAULT_SOURCE_URL;

#[derive(Parser)]
#[command(
    name = "audio-relay",
    about = "Audio Relay - Extract the audio of a video and publish it to Cloudinary",
    version,
    long_about = "Downloads the best audio stream of a video with yt-dlp, converts it to a 192 kbps MP3, uploads it to Cloudinary and prints the hosted URL. The local file is removed once the upload succeeds."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Settings file (YAML) to load instead of the default lookup
    #[arg(long, global = true, value_name = "FILE", env = "AUDIO_RELAY_SETTINGS")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download, upload and clean up in one go (the default)
    Relay {
        /// Video URL to take the audio from
        #[arg(value_name = "URL", default_value = DEFAULT_SOURCE_URL)]
        url: String,

        /// Local MP3 path (a unique name is generated if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Keep the local MP3 after a successful upload
        #[arg(long)]
        keep_local: bool,

        /// Exit with a non-zero status when the relay fails
        #[arg(long)]
        strict: bool,

        /// Format of the final result line
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Only download and convert the audio
    Fetch {
        /// Video URL to take the audio from
        #[arg(value_name = "URL", default_value = DEFAULT_SOURCE_URL)]
        url: String,

        /// Local MP3 path (a unique name is generated if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Only upload an existing local file
    Upload {
        /// File to upload
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Format of the result
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the effective configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// Check that yt-dlp and ffmpeg are installed
    Check,
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Relay {
            url: DEFAULT_SOURCE_URL.to_string(),
            output: None,
            keep_local: false,
            strict: false,
            format: OutputFormat::Text,
        }
    }
}

impl Commands {
    /// Output format requested by the command, text when it has none
    pub fn output_format(&self) -> OutputFormat {
        match self {
            Commands::Relay { format, .. } | Commands::Upload { format, .. } => *format,
            _ => OutputFormat::Text,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON object with the hosted asset
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
