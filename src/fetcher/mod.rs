use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod ytdlp;

pub use ytdlp::YtDlpFetcher;

use crate::Result;

/// Trait for turning a video URL into a local audio file
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    /// Download the audio of `source_url` and write it to `output_path`.
    ///
    /// Returns the path of the finished file. An existing file at that path is overwritten.
    async fn fetch_audio(&self, source_url: &str, output_path: &Path) -> Result<PathBuf>;

    /// Name of the engine doing the work
    fn engine_name(&self) -> &'static str;
}

/// Path the finished file ends up at once converted to `audio_format`
pub fn final_audio_path(output_path: &Path, audio_format: &str) -> PathBuf {
    output_path.with_extension(audio_format)
}

/// yt-dlp output template for `output_path`.
///
/// The extension is left to yt-dlp so the post-processor can swap it, and literal
/// `%` characters are escaped so they are not read as template fields.
pub fn output_template(output_path: &Path) -> String {
    let stem = output_path.with_extension("");
    format!("{}.%(ext)s", stem.to_string_lossy().replace('%', "%%"))
}
