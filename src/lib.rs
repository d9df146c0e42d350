//! Audio Relay - A Rust CLI tool for publishing the audio track of online videos
//!
//! This library downloads the audio of a video URL with yt-dlp, converts it to MP3,
//! uploads it to Cloudinary and hands back the hosted secure URL.

pub mod cli;
pub mod config;
pub mod fetcher;
pub mod output;
pub mod pipeline;
pub mod uploader;
pub mod utils;

use std::path::PathBuf;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use fetcher::{AudioFetcher, YtDlpFetcher};
pub use pipeline::{ConsoleReporter, RelayOutcome, RelayPipeline, Reporter, Stage};
pub use uploader::{CloudinaryUploader, MediaUploader, UploadedAsset};

/// Video fetched when no URL is given on the command line
pub const DEFAULT_SOURCE_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// Result type used throughout the library
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Error types specific to the relay
#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("File operation failed on {}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Pipeline stage the error was raised from
    pub fn failed_stage(&self) -> Stage {
        match self {
            RelayError::Config(_) => Stage::Idle,
            RelayError::Download(_) => Stage::Fetching,
            RelayError::Upload(_) => Stage::Uploading,
            RelayError::Filesystem { .. } => Stage::Cleanup,
        }
    }
}
