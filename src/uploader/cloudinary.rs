use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::{MediaUploader, UploadedAsset};
use crate::config::{CloudinaryConfig, SignatureAlgorithm};
use crate::utils::format_file_size;
use crate::{RelayError, Result};

/// Signed uploads against the Cloudinary REST API
pub struct CloudinaryUploader {
    client: Client,
    config: CloudinaryConfig,
}

struct Credentials<'a> {
    cloud_name: &'a str,
    api_key: &'a str,
    api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

impl CloudinaryUploader {
    pub fn new(config: CloudinaryConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Credentials are only checked here, at upload time
    fn credentials(&self) -> Result<Credentials<'_>> {
        let require = |value: &Option<String>, name: &str| -> Result<()> {
            match value.as_deref() {
                Some(v) if !v.is_empty() => Ok(()),
                _ => Err(RelayError::Upload(format!("Must supply {}", name))),
            }
        };

        require(&self.config.api_key, "api_key")?;
        require(&self.config.api_secret, "api_secret")?;
        require(&self.config.cloud_name, "cloud_name")?;

        Ok(Credentials {
            cloud_name: self.config.cloud_name.as_deref().unwrap_or_default(),
            api_key: self.config.api_key.as_deref().unwrap_or_default(),
            api_secret: self.config.api_secret.as_deref().unwrap_or_default(),
        })
    }

    /// Upload endpoint for the configured resource type
    pub fn upload_url(&self, cloud_name: &str) -> String {
        format!(
            "{}/{}/{}/upload",
            self.config.api_base_url.trim_end_matches('/'),
            cloud_name,
            self.config.resource_type
        )
    }

    /// Parameters covered by the signature
    fn signed_params(&self, timestamp: i64) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("timestamp".to_string(), timestamp.to_string());

        if let Some(folder) = self.config.folder.as_deref().filter(|f| !f.is_empty()) {
            params.insert("folder".to_string(), folder.to_string());
        }
        if self.config.use_filename {
            params.insert("use_filename".to_string(), "true".to_string());
        }

        params
    }
}

/// Sign upload parameters the way Cloudinary verifies them.
///
/// Parameters are serialized as `key=value` pairs sorted by key and joined with `&`,
/// the API secret is appended, and the result is hashed and hex encoded.
/// Empty values are left out.
pub fn api_sign_request(
    params: &BTreeMap<String, String>,
    api_secret: &str,
    algorithm: SignatureAlgorithm,
) -> String {
    let to_sign = params
        .iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");
    let payload = format!("{}{}", to_sign, api_secret);

    match algorithm {
        SignatureAlgorithm::Sha1 => hex::encode(Sha1::digest(payload.as_bytes())),
        SignatureAlgorithm::Sha256 => hex::encode(Sha256::digest(payload.as_bytes())),
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl MediaUploader for CloudinaryUploader {
    async fn upload(&self, file_path: &Path) -> Result<UploadedAsset> {
        let credentials = self.credentials()?;

        let content = fs_err::read(file_path).map_err(|e| RelayError::Upload(e.to_string()))?;
        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let url = self.upload_url(credentials.cloud_name);
        let params = self.signed_params(chrono::Utc::now().timestamp());
        let signature =
            api_sign_request(&params, credentials.api_secret, self.config.signature_algorithm);

        tracing::info!(
            "Uploading {} ({}) as {} to {}",
            file_path.display(),
            format_file_size(content.len() as u64),
            self.config.resource_type,
            url
        );

        let mut form = Form::new().part("file", Part::bytes(content).file_name(filename));
        for (key, value) in params {
            form = form.text(key, value);
        }
        let form = form
            .text("api_key", credentials.api_key.to_string())
            .text("signature", signature);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Upload(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Upload(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(RelayError::Upload(format!(
                "Cloudinary returned {}: {}",
                status,
                error_message(&body)
            )));
        }

        let asset: UploadedAsset = serde_json::from_str(&body)
            .map_err(|e| {
                RelayError::Upload(format!("Unexpected response from Cloudinary: {}", e))
            })?;

        match Url::parse(&asset.secure_url) {
            Ok(parsed) if parsed.scheme() == "https" => {}
            _ => {
                return Err(RelayError::Upload(format!(
                    "Cloudinary returned a non-HTTPS url: {}",
                    asset.secure_url
                )))
            }
        }

        tracing::info!("Uploaded to Cloudinary: {}", asset.secure_url);
        Ok(asset)
    }

    fn service_name(&self) -> &'static str {
        "Cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn signature_matches_documented_example() {
        let params = params(&[
            ("timestamp", "1315060510"),
            ("public_id", "sample_image"),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop"),
        ]);

        assert_eq!(
            api_sign_request(&params, "abcd", SignatureAlgorithm::Sha1),
            "bfd09f95f331f558cbd1320e67aa8d488770583e"
        );
    }

    #[test]
    fn sha256_signatures_are_longer_and_distinct() {
        let params = params(&[("timestamp", "1315060510")]);
        let sha1 = api_sign_request(&params, "abcd", SignatureAlgorithm::Sha1);
        let sha256 = api_sign_request(&params, "abcd", SignatureAlgorithm::Sha256);

        assert_eq!(sha1.len(), 40);
        assert_eq!(sha256.len(), 64);
        assert_ne!(&sha256[..40], sha1);
    }

    #[test]
    fn empty_values_are_not_signed() {
        let with_empty = params(&[("timestamp", "1"), ("folder", "")]);
        let without = params(&[("timestamp", "1")]);

        assert_eq!(
            api_sign_request(&with_empty, "s", SignatureAlgorithm::Sha1),
            api_sign_request(&without, "s", SignatureAlgorithm::Sha1)
        );
    }

    #[test]
    fn upload_url_uses_resource_type() {
        let config = CloudinaryConfig {
            api_base_url: "https://api.cloudinary.com/v1_1/".to_string(),
            ..CloudinaryConfig::default()
        };
        let uploader = CloudinaryUploader::new(config).unwrap();

        assert_eq!(
            uploader.upload_url("demo"),
            "https://api.cloudinary.com/v1_1/demo/video/upload"
        );
    }

    #[test]
    fn optional_params_are_signed_when_configured() {
        let config = CloudinaryConfig {
            folder: Some("youtube-audios".to_string()),
            use_filename: true,
            ..CloudinaryConfig::default()
        };
        let uploader = CloudinaryUploader::new(config).unwrap();
        let params = uploader.signed_params(42);

        assert_eq!(params.get("timestamp").map(String::as_str), Some("42"));
        assert_eq!(params.get("folder").map(String::as_str), Some("youtube-audios"));
        assert_eq!(params.get("use_filename").map(String::as_str), Some("true"));
    }

    #[test]
    fn credentials_are_checked_in_sdk_order() {
        let uploader = CloudinaryUploader::new(CloudinaryConfig::default()).unwrap();
        let err = uploader.credentials().err().unwrap();
        assert_eq!(err.to_string(), "Upload failed: Must supply api_key");

        let config = CloudinaryConfig {
            api_key: Some("key".to_string()),
            api_secret: Some("secret".to_string()),
            ..CloudinaryConfig::default()
        };
        let err = CloudinaryUploader::new(config).unwrap().credentials().err().unwrap();
        assert_eq!(err.to_string(), "Upload failed: Must supply cloud_name");
    }

    #[test]
    fn error_messages_are_pulled_from_json() {
        assert_eq!(
            error_message(r#"{"error":{"message":"Invalid Signature abc"}}"#),
            "Invalid Signature abc"
        );
        assert_eq!(error_message("  gateway timeout "), "gateway timeout");
        assert_eq!(error_message(""), "no details");
    }
}
