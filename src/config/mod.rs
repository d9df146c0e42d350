use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::{RelayError, Result};

const SETTINGS_FILE: &str = "audio-relay.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cloudinary account and upload options
    pub cloudinary: CloudinaryConfig,

    /// yt-dlp invocation settings
    pub fetch: FetchConfig,

    /// Application settings
    pub app: AppConfig,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    /// Cloud name (CLOUD_NAME)
    pub cloud_name: Option<String>,

    /// API key (API_KEY)
    pub api_key: Option<String>,

    /// API secret (API_SECRET)
    pub api_secret: Option<String>,

    /// Base of the upload API, without the cloud name
    pub api_base_url: String,

    /// Resource type the asset is filed under
    pub resource_type: String,

    /// Optional folder for uploaded assets
    pub folder: Option<String>,

    /// Use the local filename as the public id prefix
    pub use_filename: bool,

    /// Digest used for request signatures
    pub signature_algorithm: SignatureAlgorithm,

    /// Request timeout; the HTTP client default applies when unset
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl SignatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Sha1 => "sha1",
            SignatureAlgorithm::Sha256 => "sha256",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,

    /// yt-dlp format selector
    pub format_selector: String,

    /// Target audio codec
    pub audio_format: String,

    /// Target bitrate in kbps
    pub audio_quality: u32,

    /// Only fetch the single video when the URL also names a playlist
    pub no_playlist: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for downloaded audio; current directory when unset
    pub download_dir: Option<PathBuf>,

    /// Keep audio files after upload
    pub keep_local: bool,

    /// Exit non-zero when the relay fails
    pub strict_exit: bool,
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            api_base_url: "https://api.cloudinary.com/v1_1".to_string(),
            resource_type: "video".to_string(),
            folder: None,
            use_filename: false,
            signature_algorithm: SignatureAlgorithm::Sha1,
            timeout_secs: None,
        }
    }
}

impl std::fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "***"))
            .field("api_base_url", &self.api_base_url)
            .field("resource_type", &self.resource_type)
            .field("folder", &self.folder)
            .field("use_filename", &self.use_filename)
            .field("signature_algorithm", &self.signature_algorithm)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            format_selector: "bestaudio/best".to_string(),
            audio_format: "mp3".to_string(),
            audio_quality: 192,
            no_playlist: true,
        }
    }
}

impl Config {
    /// Load configuration from the settings file (if any) and the process environment.
    ///
    /// Missing credentials are not an error here; the uploader rejects them when it is called.
    pub fn load(settings: Option<&Path>) -> Result<Self> {
        let mut config = match Self::settings_path(settings) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a YAML settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("Failed to read settings file: {}", e)))?;

        tracing::debug!("Loaded settings from {}", path.display());
        Self::from_yaml(&content).map_err(|e| {
            RelayError::Config(format!("Failed to parse settings file {}: {}", path.display(), e))
        })
    }

    fn from_yaml(content: &str) -> serde_yaml::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(content)
    }

    /// Overlay credentials from the environment.
    ///
    /// `CLOUDINARY_URL` fills in anything the settings file left out, and the
    /// individual variables win over both.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let cloudinary = &mut self.cloudinary;

        if let Some(raw) = lookup("CLOUDINARY_URL") {
            let (cloud_name, api_key, api_secret) = parse_cloudinary_url(&raw)?;
            cloudinary.cloud_name = Some(cloud_name);
            cloudinary.api_key = Some(api_key);
            cloudinary.api_secret = Some(api_secret);
        }

        if let Some(cloud_name) = lookup("CLOUD_NAME") {
            cloudinary.cloud_name = Some(cloud_name);
        }
        if let Some(api_key) = lookup("API_KEY") {
            cloudinary.api_key = Some(api_key);
        }
        if let Some(api_secret) = lookup("API_SECRET") {
            cloudinary.api_secret = Some(api_secret);
        }

        Ok(())
    }

    /// Get settings file path
    fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }

        // First try current directory for easy testing
        let local = PathBuf::from(SETTINGS_FILE);
        if local.exists() {
            return Some(local);
        }

        dirs::config_dir()
            .map(|dir| dir.join("audio-relay").join("config.yaml"))
            .filter(|path| path.exists())
    }

    /// Directory the audio is downloaded into
    pub fn download_dir(&self) -> PathBuf {
        self.app
            .download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Display current configuration
    pub fn display(&self) {
        let cloudinary = &self.cloudinary;
        let or_unset =
            |value: &Option<String>| value.clone().unwrap_or_else(|| "(not set)".to_string());

        println!("Current Configuration:");
        println!("  Cloud Name: {}", or_unset(&cloudinary.cloud_name));
        println!("  API Key: {}", or_unset(&cloudinary.api_key));
        println!(
            "  API Secret: {}",
            cloudinary
                .api_secret
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "(not set)".to_string())
        );
        println!("  Upload API: {}", cloudinary.api_base_url);
        println!("  Resource Type: {}", cloudinary.resource_type);
        if let Some(folder) = &cloudinary.folder {
            println!("  Folder: {}", folder);
        }
        println!("  Signature: {}", cloudinary.signature_algorithm.as_str());
        println!("  yt-dlp: {}", self.fetch.yt_dlp_path);
        println!(
            "  Audio: {} @ {} kbps ({})",
            self.fetch.audio_format, self.fetch.audio_quality, self.fetch.format_selector
        );
        println!("  Download Dir: {}", self.download_dir().display());
        println!("  Keep Local: {}", self.app.keep_local);
        println!("  Strict Exit: {}", self.app.strict_exit);
    }
}

/// Split `cloudinary://<api_key>:<api_secret>@<cloud_name>` into its parts
pub fn parse_cloudinary_url(raw: &str) -> Result<(String, String, String)> {
    let invalid = || {
        RelayError::Config(
            "CLOUDINARY_URL must look like cloudinary://<api_key>:<api_secret>@<cloud_name>"
                .to_string(),
        )
    };

    let parsed = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if parsed.scheme() != "cloudinary" {
        return Err(invalid());
    }

    let cloud_name = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let api_key = Some(parsed.username()).filter(|k| !k.is_empty()).ok_or_else(invalid)?;
    let api_secret = parsed.password().filter(|s| !s.is_empty()).ok_or_else(invalid)?;

    Ok((cloud_name.to_string(), api_key.to_string(), api_secret.to_string()))
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(3).collect();
    if secret.chars().count() <= 3 {
        "***".to_string()
    } else {
        format!("{}***", visible)
    }
}
