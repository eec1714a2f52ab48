//! Runtime settings loaded once from the process environment.
//!
//! `Settings` is built at startup (after `.env` loading), checked with
//! [`Settings::validate`], and then shared read-only with every provider.

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

/// Placeholder shipped in example `.env` files; treated as unset.
const FAL_KEY_PLACEHOLDER: &str = "your-fal-api-key-here";
const ANTHROPIC_KEY_PLACEHOLDER: &str = "your-anthropic-api-key-here";

pub const DEFAULT_FAL_API_BASE: &str = "https://fal.run";
pub const DEFAULT_FAL_STORAGE_BASE: &str = "https://rest.alpha.fal.ai";
pub const DEFAULT_ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
pub const DEFAULT_VALIDATION_MODEL: &str = "claude-haiku-4-5-20251001";

/// Pipeline settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Key for image, speech and video generation plus asset storage.
    pub fal_key: Option<SecretString>,
    /// Key for the slide validation vision model.
    pub anthropic_key: Option<SecretString>,
    pub fal_api_base: String,
    pub fal_storage_base: String,
    pub anthropic_api_base: String,
    pub validation_model: String,
    /// Resolved ffmpeg binary, if any.
    pub ffmpeg_path: Option<PathBuf>,
    /// Resolved ffprobe binary, if any.
    pub ffprobe_path: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fal_key: None,
            anthropic_key: None,
            fal_api_base: DEFAULT_FAL_API_BASE.to_string(),
            fal_storage_base: DEFAULT_FAL_STORAGE_BASE.to_string(),
            anthropic_api_base: DEFAULT_ANTHROPIC_API_BASE.to_string(),
            validation_model: DEFAULT_VALIDATION_MODEL.to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Load settings from environment variables.
    ///
    /// Missing values are left as `None`; call [`Settings::validate`] to turn
    /// them into actionable errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let fal_key = non_empty("FAL_KEY")
            .or_else(|| non_empty("FAL_API_KEY"))
            .filter(|v| v != FAL_KEY_PLACEHOLDER)
            .map(SecretString::from);
        let anthropic_key = non_empty("ANTHROPIC_API_KEY")
            .filter(|v| v != ANTHROPIC_KEY_PLACEHOLDER)
            .map(SecretString::from);

        let mut retry = RetryPolicy::default();
        if let Some(raw) = non_empty("SLIDEREEL_MAX_RETRIES") {
            retry.max_attempts = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SLIDEREEL_MAX_RETRIES".to_string(),
                message: format!("expected a positive integer, got '{}'", raw),
            })?;
        }
        if let Some(raw) = non_empty("SLIDEREEL_RETRY_DELAY_MS") {
            let ms: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "SLIDEREEL_RETRY_DELAY_MS".to_string(),
                message: format!("expected milliseconds, got '{}'", raw),
            })?;
            retry.initial_delay = Duration::from_millis(ms);
        }

        let path_var = lookup("PATH");
        let ffmpeg_path = non_empty("FFMPEG_PATH")
            .map(PathBuf::from)
            .or_else(|| find_on_path("ffmpeg", path_var.as_deref()));
        let ffprobe_path = non_empty("FFPROBE_PATH")
            .map(PathBuf::from)
            .or_else(|| find_on_path("ffprobe", path_var.as_deref()));

        let defaults = Self::default();
        let base_url = |key: &str, default: String| -> Result<String, ConfigError> {
            match non_empty(key) {
                Some(raw) => parse_base_url(key, &raw),
                None => Ok(default),
            }
        };
        Ok(Self {
            fal_key,
            anthropic_key,
            fal_api_base: base_url("FAL_API_BASE", defaults.fal_api_base)?,
            fal_storage_base: base_url("FAL_STORAGE_BASE", defaults.fal_storage_base)?,
            anthropic_api_base: base_url("ANTHROPIC_API_BASE", defaults.anthropic_api_base)?,
            validation_model: non_empty("SLIDEREEL_VALIDATION_MODEL")
                .unwrap_or(defaults.validation_model),
            ffmpeg_path,
            ffprobe_path,
            retry,
            request_timeout: defaults.request_timeout,
        })
    }

    /// Check that everything a run needs is present.
    ///
    /// `requires_vision` adds the validation model key to the required set.
    pub fn validate(&self, requires_vision: bool) -> Result<(), ConfigError> {
        if self.fal_key.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "FAL_KEY".to_string(),
                hint: "Add your API key to the .env file as FAL_KEY=your-actual-api-key \
                       (get one at https://fal.ai/dashboard/keys)"
                    .to_string(),
            });
        }
        if requires_vision && self.anthropic_key.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "ANTHROPIC_API_KEY".to_string(),
                hint: "Slide validation is enabled; add ANTHROPIC_API_KEY to the .env file \
                       or disable validate_slides"
                    .to_string(),
            });
        }
        if self.ffmpeg_path.is_none() {
            return Err(ConfigError::MissingTool {
                tool: "ffmpeg".to_string(),
                hint: "Install FFmpeg (https://ffmpeg.org/download.html) and add it to PATH, \
                       or set FFMPEG_PATH"
                    .to_string(),
            });
        }
        if self.ffprobe_path.is_none() {
            return Err(ConfigError::MissingTool {
                tool: "ffprobe".to_string(),
                hint: "ffprobe ships with FFmpeg; install FFmpeg or set FFPROBE_PATH".to_string(),
            });
        }
        Ok(())
    }

    /// The fal key, still wrapped, or an error naming the missing variable.
    pub fn require_fal_key(&self) -> Result<&SecretString, ConfigError> {
        self.fal_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("FAL_KEY".to_string()))
    }

    /// The validation model key, still wrapped.
    pub fn require_anthropic_key(&self) -> Result<&SecretString, ConfigError> {
        self.anthropic_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ANTHROPIC_API_KEY".to_string()))
    }

    pub fn ffmpeg(&self) -> Result<&Path, ConfigError> {
        self.ffmpeg_path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingTool {
                tool: "ffmpeg".to_string(),
                hint: "Install FFmpeg and add it to PATH".to_string(),
            })
    }

    pub fn ffprobe(&self) -> Result<&Path, ConfigError> {
        self.ffprobe_path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingTool {
                tool: "ffprobe".to_string(),
                hint: "Install FFmpeg to get ffprobe".to_string(),
            })
    }
}

/// Parse an endpoint override, rejecting anything that is not http(s).
fn parse_base_url(key: &str, raw: &str) -> Result<String, ConfigError> {
    let parsed = url::Url::parse(raw).map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{}' is not a valid URL: {}", raw, e),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an http(s) URL, got '{}'", raw),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Locate an executable on a `PATH`-style search list.
pub fn find_on_path(binary: &str, path_var: Option<&str>) -> Option<PathBuf> {
    let path_var = path_var?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{}.exe", binary), binary.to_string()]
    } else {
        vec![binary.to_string()]
    };

    std::env::split_paths(path_var).find_map(|dir| {
        candidates
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    })
}
