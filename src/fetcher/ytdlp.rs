use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{final_audio_path, output_template, AudioFetcher};
use crate::config::FetchConfig;
use crate::{RelayError, Result};

/// Audio fetcher backed by the yt-dlp executable (with ffmpeg for conversion)
pub struct YtDlpFetcher {
    yt_dlp_path: String,
    format_selector: String,
    audio_format: String,
    audio_quality: u32,
    no_playlist: bool,
}

impl YtDlpFetcher {
    pub fn new() -> Self {
        Self::from_config(&FetchConfig::default())
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            yt_dlp_path: config.yt_dlp_path.clone(),
            format_selector: config.format_selector.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality,
            no_playlist: config.no_playlist,
        }
    }

    /// Executable this fetcher runs
    pub fn program(&self) -> &str {
        &self.yt_dlp_path
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.yt_dlp_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Command-line arguments for one download
    pub fn build_args(&self, source_url: &str, output_path: &Path) -> Vec<String> {
        let mut args = vec![
            // Best pure-audio stream, else the best combined one
            "--format".to_string(),
            self.format_selector.clone(),
            // Convert with ffmpeg
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_format.clone(),
            "--audio-quality".to_string(),
            format!("{}K", self.audio_quality),
            "--output".to_string(),
            output_template(output_path),
            "--force-overwrites".to_string(),
        ];

        if self.no_playlist {
            args.push("--no-playlist".to_string());
        }

        args.push("--".to_string());
        args.push(source_url.to_string());
        args
    }
}

#[async_trait]
impl AudioFetcher for YtDlpFetcher {
    async fn fetch_audio(&self, source_url: &str, output_path: &Path) -> Result<PathBuf> {
        let final_path = final_audio_path(output_path, &self.audio_format);
        tracing::debug!("Downloading audio for {} to {}", source_url, final_path.display());

        let output = Command::new(&self.yt_dlp_path)
            .args(self.build_args(source_url, output_path))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                RelayError::Download(format!("could not run {}: {}", self.yt_dlp_path, e))
            })?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(RelayError::Download(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                error.trim()
            )));
        }

        if !final_path.is_file() {
            return Err(RelayError::Download(format!(
                "yt-dlp finished but {} was not written",
                final_path.display()
            )));
        }

        tracing::debug!("yt-dlp wrote {}", final_path.display());
        Ok(final_path)
    }

    fn engine_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpFetcher {
    fn default() -> Self {
        Self::new()
    }
}
