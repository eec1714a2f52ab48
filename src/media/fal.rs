//! fal.ai model gateway and asset storage.
//!
//! Image, speech and video generation all go through the same synchronous
//! model endpoint (`POST {base}/{model}`), so they share one client. Local
//! reference images are pushed to fal storage and passed to models by URL.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use crate::config::Settings;
use crate::error::{ConfigError, ProviderError};

const PROVIDER: &str = "fal";

/// Upload and download of binary assets.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload a local file and return a URL the generation models can read.
    async fn upload_file(&self, path: &Path) -> Result<String, ProviderError>;

    /// Download `url` into `dest`, replacing any existing file.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProviderError>;
}

/// Guess an image MIME type from a file extension, defaulting to PNG.
pub fn mime_for_path(path: &Path) -> String {
    match mime_guess::from_path(path).first() {
        Some(mime) if matches!(mime.type_().as_str(), "image" | "video" | "audio") => {
            mime.essence_str().to_string()
        }
        _ => "image/png".to_string(),
    }
}

/// Pull a URL out of a model response by JSON pointer (e.g. `/images/0/url`).
pub fn extract_url(response: &Value, pointer: &str) -> Result<String, ProviderError> {
    response
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("response has no URL at {}", pointer),
        })
}

#[derive(Debug, Deserialize)]
struct UploadTicket {
    upload_url: String,
    file_url: String,
}

/// HTTP client for the fal.ai model gateway and storage API.
pub struct FalClient {
    client: reqwest::Client,
    api_key: SecretString,
    api_base: String,
    storage_base: String,
}

impl FalClient {
    /// Build a client from loaded settings.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let api_key = settings
            .fal_key
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("FAL_KEY".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            api_key,
            api_base: settings.fal_api_base.trim_end_matches('/').to_string(),
            storage_base: settings.fal_storage_base.trim_end_matches('/').to_string(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key.expose_secret())
    }

    fn model_url(&self, model: &str) -> String {
        if model.starts_with("http://") || model.starts_with("https://") {
            return model.to_string();
        }
        format!("{}/{}", self.api_base, model.trim_start_matches('/'))
    }

    /// Run a model synchronously and return its JSON output.
    pub async fn run(&self, model: &str, arguments: &Value) -> Result<Value, ProviderError> {
        let url = self.model_url(model);
        tracing::debug!(model, "Submitting fal request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(arguments)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("{}: {}", model, e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        check_status(status, &body)?;

        serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: format!("JSON parse error: {}. Raw: {}", e, truncate(&body, 512)),
        })
    }

    /// Upload raw bytes to fal storage and return the public file URL.
    pub async fn upload_bytes(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        file_name: &str,
    ) -> Result<String, ProviderError> {
        let initiate = format!(
            "{}/storage/upload/initiate?storage_type=fal-cdn-v3",
            self.storage_base
        );
        let response = self
            .client
            .post(&initiate)
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({
                "content_type": content_type,
                "file_name": file_name,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("upload initiate: {}", e),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        check_status(status, &body)?;
        let ticket: UploadTicket =
            serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: format!("upload ticket: {}", e),
            })?;

        let put = self
            .client
            .put(&ticket.upload_url)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("upload: {}", e),
            })?;
        let status = put.status();
        if !status.is_success() {
            let body = put.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("upload returned HTTP {}: {}", status, truncate(&body, 512)),
            });
        }

        Ok(ticket.file_url)
    }
}

#[async_trait]
impl AssetStore for FalClient {
    async fn upload_file(&self, path: &Path) -> Result<String, ProviderError> {
        let bytes = tokio::fs::read(path).await?;
        let content_type = mime_for_path(path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        self.upload_bytes(bytes, &content_type, &file_name).await
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("download {}: {}", url, e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("download returned HTTP {}: {}", status, truncate(&body, 512)),
            });
        }

        let bytes = response.bytes().await?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        tracing::debug!(path = %dest.display(), bytes = bytes.len(), "Downloaded asset");
        Ok(())
    }
}

/// Map a non-success HTTP status onto the provider error taxonomy.
fn check_status(status: reqwest::StatusCode, body: &str) -> Result<(), ProviderError> {
    if status.is_success() {
        return Ok(());
    }
    match status.as_u16() {
        401 | 403 => Err(ProviderError::AuthFailed {
            provider: PROVIDER.to_string(),
        }),
        429 => Err(ProviderError::RateLimited {
            provider: PROVIDER.to_string(),
            retry_after: None,
        }),
        _ => Err(ProviderError::RequestFailed {
            provider: PROVIDER.to_string(),
            reason: format!("HTTP {}: {}", status, truncate(body, 512)),
        }),
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
