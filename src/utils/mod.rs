use std::path::Path;
use url::Url;

use crate::fetcher::YtDlpFetcher;
use crate::{RelayError, Result};

/// Format file size in human-readable format
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let unit_index = (bytes_f.log10() / THRESHOLD.log10()).floor() as usize;
    let unit_index = unit_index.min(UNITS.len() - 1);

    let size = bytes_f / THRESHOLD.powi(unit_index as i32);

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Sanitize filename for safe filesystem usage
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            c if c.is_alphanumeric() || c == '-' || c == '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

/// Check if a file exists and is readable
pub fn check_file_accessible(path: &Path) -> Result<()> {
    let unreadable = |reason: String| RelayError::Upload(format!("{}: {}", reason, path.display()));

    if !path.exists() {
        return Err(unreadable("File does not exist".to_string()));
    }

    if !path.is_file() {
        return Err(unreadable("Path is not a file".to_string()));
    }

    std::fs::metadata(path).map_err(|e| unreadable(format!("Cannot access file ({})", e)))?;

    Ok(())
}

/// Generate a unique filename with timestamp
pub fn generate_unique_filename(base_name: &str, extension: &str) -> String {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let random_suffix = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();

    let base = sanitize_filename(base_name);
    let base = if base.is_empty() { "audio".to_string() } else { base };

    format!("audio-relay_{}_{}_{}.{}", base, timestamp, random_suffix, extension)
}

/// Short name for a source URL, used in generated filenames.
///
/// YouTube-style `v=` ids win, then the last path segment.
pub fn source_stem(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "audio".to_string();
    };

    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        return sanitize_filename(&id);
    }

    parsed
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()).map(sanitize_filename))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "audio".to_string())
}

/// Extract domain from URL for display purposes
pub fn extract_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .host_str()
        .map(|host| host.strip_prefix("www.").unwrap_or(host).to_string())
}

/// Check if the current environment has required tools
pub async fn check_dependencies(fetcher: &YtDlpFetcher) -> Vec<String> {
    let mut missing = Vec::new();

    if !fetcher.check_availability().await {
        missing.push(format!("{} - required to download audio", fetcher.program()));
    }

    // yt-dlp hands the MP3 conversion to ffmpeg
    if !check_command_available("ffmpeg", "-version").await {
        missing.push("ffmpeg - required to convert audio to mp3".to_string());
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, version_flag: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg(version_flag)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
