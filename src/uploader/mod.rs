use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod cloudinary;

pub use cloudinary::{api_sign_request, CloudinaryUploader};

use crate::Result;

/// Hosted asset as reported by the media service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedAsset {
    /// Public HTTPS location of the asset
    pub secure_url: String,

    /// Service-side identifier
    #[serde(default)]
    pub public_id: Option<String>,

    /// Resource type the service filed the asset under
    #[serde(default)]
    pub resource_type: Option<String>,

    /// Stored format (mp3, ...)
    #[serde(default)]
    pub format: Option<String>,

    /// Stored size in bytes
    #[serde(default)]
    pub bytes: Option<u64>,

    /// Upload time reported by the service
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Trait for publishing a local file to a media host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Upload the file at `file_path` and return the hosted asset
    async fn upload(&self, file_path: &Path) -> Result<UploadedAsset>;

    /// Get the name of the hosting service
    fn service_name(&self) -> &'static str;
}
