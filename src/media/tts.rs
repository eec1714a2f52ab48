//! Narration voiceover.
//!
//! Provides a trait-based abstraction for speech providers, with an
//! ElevenLabs v3 implementation on fal.ai. Narration can be produced one
//! clip per slide, or as a single continuous track with pauses between
//! slides.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, MediaError, ProviderError, Result};
use crate::media::fal::{AssetStore, FalClient, extract_url};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Speech model used for narration.
pub const TTS_MODEL: &str = "fal-ai/elevenlabs/tts/eleven-v3";
/// File name of the combined narration track.
pub const COMBINED_FILE_NAME: &str = "narration_full.mp3";
/// Marker inserted between slides in a combined track.
pub const DEFAULT_PAUSE_MARKER: &str = "...";
/// How many times the pause marker is repeated between slides.
pub const DEFAULT_PAUSE_COUNT: usize = 2;

/// Gender classification for voices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceGender {
    Male,
    Female,
    Neutral,
}

impl std::fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// Voices known by symbolic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnownVoice {
    George,
    Aria,
    Rachel,
    Sam,
    Charlie,
    Emily,
    Hope,
}

impl KnownVoice {
    pub const ALL: [KnownVoice; 7] = [
        Self::George,
        Self::Aria,
        Self::Rachel,
        Self::Sam,
        Self::Charlie,
        Self::Emily,
        Self::Hope,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::George => "George",
            Self::Aria => "Aria",
            Self::Rachel => "Rachel",
            Self::Sam => "Sam",
            Self::Charlie => "Charlie",
            Self::Emily => "Emily",
            Self::Hope => "Hope",
        }
    }

    /// Parse a symbolic name, ignoring case.
    pub fn from_str_name(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Provider voice id, for voices that are not addressed by name.
    pub fn custom_id(&self) -> Option<&'static str> {
        match self {
            Self::Hope => Some("tnSpp4vdxKPjI9w0GnoV"),
            _ => None,
        }
    }

    pub fn gender(&self) -> VoiceGender {
        match self {
            Self::George | Self::Sam => VoiceGender::Male,
            Self::Aria | Self::Rachel | Self::Emily | Self::Hope => VoiceGender::Female,
            Self::Charlie => VoiceGender::Neutral,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::George => "Professional male voice, clear and authoritative; good for business",
            Self::Aria => "Professional female voice, warm and engaging; good for training",
            Self::Rachel => "Conversational female voice; good for casual content",
            Self::Sam => "Young male voice, energetic; good for marketing and tech",
            Self::Charlie => "Neutral, authoritative voice; good for documentaries",
            Self::Emily => "Soft female voice, calming; good for wellness content",
            Self::Hope => "Custom narration voice",
        }
    }
}

impl std::fmt::Display for KnownVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved narration voice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Voice {
    Named(KnownVoice),
    /// Opaque provider voice id.
    RawId(String),
}

impl Default for Voice {
    fn default() -> Self {
        Self::Named(KnownVoice::George)
    }
}

impl Voice {
    /// Resolve a user-supplied voice identifier.
    ///
    /// Known names win, then anything that looks like a provider id (longer
    /// than 15 chars or containing a digit). Anything else falls back to
    /// George with a warning.
    pub fn resolve(input: &str) -> Self {
        let trimmed = input.trim();
        if let Some(known) = KnownVoice::from_str_name(trimmed) {
            return Self::Named(known);
        }
        if looks_like_voice_id(trimmed) {
            return Self::RawId(trimmed.to_string());
        }
        tracing::warn!(voice = %input, "Voice not recognized, using George");
        Self::default()
    }

    /// Value sent to the speech provider.
    pub fn provider_id(&self) -> &str {
        match self {
            Self::Named(known) => known.custom_id().unwrap_or(known.name()),
            Self::RawId(id) => id,
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(known) => write!(f, "{}", known),
            Self::RawId(id) => write!(f, "{}", id),
        }
    }
}

fn looks_like_voice_id(s: &str) -> bool {
    s.chars().count() > 15 || s.chars().any(|c| c.is_ascii_digit())
}

/// Join narration segments into one script with a pause between segments.
pub fn join_with_pauses(narrations: &[String], pause_marker: &str, pause_count: usize) -> String {
    let pause = vec![pause_marker; pause_count].join(" ");
    let separator = if pause.is_empty() {
        " ".to_string()
    } else {
        format!(" {} ", pause)
    };
    narrations
        .iter()
        .map(|n| n.trim())
        .collect::<Vec<_>>()
        .join(&separator)
}

/// Deterministic file name for narration `number` (1-based).
pub fn narration_file_name(number: usize) -> String {
    format!("narration_{:02}.mp3", number)
}

/// Trait for text-to-speech providers.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the URL of the rendered audio.
    async fn synthesize(&self, text: &str, voice: &Voice) -> std::result::Result<String, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// ElevenLabs v3 on fal.ai.
pub struct FalSpeechSynthesizer {
    fal: Arc<FalClient>,
    speed: f64,
}

impl FalSpeechSynthesizer {
    pub fn new(fal: Arc<FalClient>) -> Self {
        Self { fal, speed: 1.0 }
    }

    /// Set the speaking rate.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    fn arguments(&self, text: &str, voice: &Voice) -> serde_json::Value {
        serde_json::json!({
            "text": text,
            "voice": voice.provider_id(),
            "speed": self.speed,
            "output_format": "mp3_44100_128",
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for FalSpeechSynthesizer {
    async fn synthesize(&self, text: &str, voice: &Voice) -> std::result::Result<String, ProviderError> {
        let response = self.fal.run(TTS_MODEL, &self.arguments(text, voice)).await?;
        extract_url(&response, "/audio/url")
    }

    fn name(&self) -> &str {
        "fal_elevenlabs_v3"
    }
}

/// Renders narration audio and writes it to disk.
pub struct VoiceoverProducer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn AssetStore>,
    retry: RetryPolicy,
}

impl VoiceoverProducer {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn AssetStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            synthesizer,
            store,
            retry,
        }
    }

    /// Narrate one slide into `out_dir/narration_NN.mp3`.
    pub async fn produce(
        &self,
        text: &str,
        number: usize,
        out_dir: &Path,
        voice: &Voice,
    ) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("slides[{}].narration", number.saturating_sub(1)),
                message: "narration text is empty".to_string(),
            }
            .into());
        }
        let dest = out_dir.join(narration_file_name(number));
        self.render(text, voice, &dest).await?;
        Ok(dest)
    }

    /// Narrate every slide, one file each.
    pub async fn produce_batch(
        &self,
        narrations: &[String],
        out_dir: &Path,
        voice: &Voice,
    ) -> Result<Vec<PathBuf>> {
        let total = narrations.len();
        let mut paths = Vec::with_capacity(total);
        for (i, text) in narrations.iter().enumerate() {
            tracing::info!(voiceover = i + 1, total, %voice, "Generating voiceover");
            let path = self.produce(text, i + 1, out_dir, voice).await?;
            tracing::info!(path = %path.display(), "Saved voiceover");
            paths.push(path);
        }
        Ok(paths)
    }

    /// Narrate all slides as one continuous track.
    pub async fn produce_combined(
        &self,
        narrations: &[String],
        out_dir: &Path,
        filename: &str,
        voice: &Voice,
        pause_marker: &str,
        pause_count: usize,
    ) -> Result<PathBuf> {
        if let Some(i) = narrations.iter().position(|n| n.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: format!("slides[{}].narration", i),
                message: "narration text is empty".to_string(),
            }
            .into());
        }
        if narrations.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "slides".to_string(),
                message: "no narration to synthesize".to_string(),
            }
            .into());
        }

        let script = join_with_pauses(narrations, pause_marker, pause_count);
        tracing::info!(
            segments = narrations.len(),
            chars = script.chars().count(),
            %voice,
            "Generating combined voiceover"
        );
        let dest = out_dir.join(filename);
        self.render(&script, voice, &dest).await?;
        tracing::info!(path = %dest.display(), "Saved combined voiceover");
        Ok(dest)
    }

    async fn render(&self, text: &str, voice: &Voice, dest: &Path) -> Result<()> {
        let url = retry_with_backoff(&self.retry, "speech", || {
            self.synthesizer.synthesize(text, voice)
        })
        .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::from)?;
        }
        retry_with_backoff(&self.retry, "download narration", || {
            self.store.download(&url, dest)
        })
        .await?;
        Ok(())
    }
}
