//! Vision model integration for slide inspection.
//!
//! Sends an image plus a prompt to a vision-capable model. Callers can attach
//! a structured-output tool; the model is then forced to answer by calling
//! that tool, and the tool input is returned as JSON.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ConfigError, ProviderError};

const PROVIDER: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";

/// Request for vision model analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionRequest {
    /// The image data (base64-encoded or URL).
    pub image: ImageSource,
    /// Prompt/question about the image.
    pub prompt: String,
    /// Structured answer the model must produce, if any.
    pub structured_output: Option<StructuredOutput>,
    /// Maximum tokens for the response.
    pub max_tokens: Option<u32>,
}

/// Source of an image for vision analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    /// Base64-encoded image data.
    Base64 { data: String, media_type: String },
    /// URL to an image.
    Url { url: String },
}

/// A forced tool call describing the required answer shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub name: String,
    pub description: String,
    /// JSON schema of the tool input.
    pub schema: serde_json::Value,
}

/// Response from vision model analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionResponse {
    /// Free text the model produced, if any.
    pub content: String,
    /// Input of the forced tool call, when the model made one.
    pub structured: Option<serde_json::Value>,
    /// Tokens used for the request.
    pub input_tokens: Option<u32>,
    /// Tokens used for the response.
    pub output_tokens: Option<u32>,
    /// Provider that performed the analysis.
    pub provider: String,
}

/// Trait for vision model providers.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Analyze an image with a vision model.
    async fn analyze(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;

    /// Check if the provider is configured.
    fn is_available(&self) -> bool;
}

/// Anthropic Messages API vision provider.
pub struct AnthropicVisionProvider {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl AnthropicVisionProvider {
    /// Create a provider from loaded settings.
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let api_key = settings
            .anthropic_key
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Ok(Self {
            client,
            api_key,
            base_url: settings.anthropic_api_base.trim_end_matches('/').to_string(),
            model: settings.validation_model.clone(),
        })
    }

    fn request_body(&self, request: &VisionRequest) -> serde_json::Value {
        let image = match &request.image {
            ImageSource::Base64 { data, media_type } => serde_json::json!({
                "type": "image",
                "source": { "type": "base64", "media_type": media_type, "data": data }
            }),
            ImageSource::Url { url } => serde_json::json!({
                "type": "image",
                "source": { "type": "url", "url": url }
            }),
        };

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "messages": [
                {
                    "role": "user",
                    "content": [image, { "type": "text", "text": request.prompt }]
                }
            ]
        });

        if let Some(tool) = &request.structured_output {
            body["tools"] = serde_json::json!([{
                "name": tool.name,
                "description": tool.description,
                "input_schema": tool.schema,
            }]);
            body["tool_choice"] = serde_json::json!({ "type": "tool", "name": tool.name });
        }
        body
    }

    fn parse_response(
        result: &serde_json::Value,
        tool_name: Option<&str>,
    ) -> VisionResponse {
        let blocks = result["content"].as_array().cloned().unwrap_or_default();

        let content = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let structured = tool_name.and_then(|name| {
            blocks
                .iter()
                .find(|b| b["type"] == "tool_use" && b["name"] == name)
                .map(|b| b["input"].clone())
        });

        VisionResponse {
            content,
            structured,
            input_tokens: result["usage"]["input_tokens"].as_u64().map(|v| v as u32),
            output_tokens: result["usage"]["output_tokens"].as_u64().map(|v| v as u32),
            provider: PROVIDER.to_string(),
        }
    }
}

#[async_trait]
impl VisionProvider for AnthropicVisionProvider {
    async fn analyze(&self, request: &VisionRequest) -> Result<VisionResponse, ProviderError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| ProviderError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthFailed {
                    provider: PROVIDER.to_string(),
                },
                429 => ProviderError::RateLimited {
                    provider: PROVIDER.to_string(),
                    retry_after: None,
                },
                _ => ProviderError::RequestFailed {
                    provider: PROVIDER.to_string(),
                    reason: format!("Vision API returned {}: {}", status, body),
                },
            });
        }

        let result: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse {
                    provider: PROVIDER.to_string(),
                    reason: format!("Failed to parse response: {}", e),
                })?;

        let tool_name = request.structured_output.as_ref().map(|t| t.name.as_str());
        Ok(Self::parse_response(&result, tool_name))
    }

    fn name(&self) -> &str {
        "anthropic_vision"
    }

    fn is_available(&self) -> bool {
        !self.api_key.expose_secret().is_empty()
    }
}
