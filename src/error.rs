//! Error types for slidereel.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),
}

/// Configuration and prerequisite errors.
///
/// These abort a run before any generation starts and are never retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("{tool} not found. {hint}")]
    MissingTool { tool: String, hint: String },

    #[error("Reference directory not found: {path}")]
    MissingReferenceDir { path: PathBuf },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Remote generation service errors.
///
/// Everything in this group is treated as transient by the retry wrapper.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Local media processing errors.
#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Media processing failed: {reason}")]
    ProcessingFailed { reason: String },

    #[error("{tool} failed while {stage}: {stderr}")]
    EncoderFailed {
        tool: String,
        stage: String,
        stderr: String,
    },

    #[error("Could not read duration of {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("Slide count ({slides}) must match audio count ({audio})")]
    CountMismatch { slides: usize, audio: usize },

    #[error("Media file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Media download failed: {reason}")]
    DownloadFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
