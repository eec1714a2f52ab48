//! Presentation definitions: slides plus run-level settings.
//!
//! Definitions are built in code or loaded from JSON. The JSON loader keeps
//! older documents working: slides without `bullet_points` get their title
//! as the single bullet, `visual` is accepted for `visual_description`, and
//! `is_title_slide` defaults to true only for the first slide.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Maximum number of bullet points rendered on a slide.
pub const MAX_BULLETS: usize = 4;

pub const DEFAULT_OUTPUT_PATH: &str = "./output/presentation.mp4";
pub const DEFAULT_VOICE: &str = "George";
pub const DEFAULT_TRANSITION_STYLE: &str = "cinematic";
pub const DEFAULT_TRANSITION_DURATION: f64 = 2.5;
pub const DEFAULT_MAX_VALIDATION_ATTEMPTS: u32 = 3;
pub const DEFAULT_MIN_VALIDATION_SCORE: i32 = 7;

/// A single slide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    /// Title shown at the top of the slide.
    pub title: String,
    /// Short on-slide bullet text.
    pub bullet_points: Vec<String>,
    /// Full spoken script for this slide.
    pub narration: String,
    /// Graphic or icon intent for the image model.
    pub visual_description: String,
    /// Title slides get a centered brand-mark layout.
    pub is_title_slide: bool,
}

impl Slide {
    pub fn new(
        title: impl Into<String>,
        bullet_points: Vec<String>,
        narration: impl Into<String>,
        visual_description: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            bullet_points,
            narration: narration.into(),
            visual_description: visual_description.into(),
            is_title_slide: false,
        }
    }

    pub fn title_slide(mut self, is_title_slide: bool) -> Self {
        self.is_title_slide = is_title_slide;
        self
    }

    /// Bullets that make it onto the slide, truncated to [`MAX_BULLETS`].
    pub fn visible_bullets(&self) -> &[String] {
        let n = self.bullet_points.len().min(MAX_BULLETS);
        &self.bullet_points[..n]
    }
}

/// How narration audio is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationMode {
    /// One audio file per slide; each slide is held for its clip's length.
    #[default]
    PerSlide,
    /// One continuous track with pauses between slides.
    Combined,
}

/// Configuration for a whole presentation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationConfig {
    pub title: Option<String>,
    pub slides: Vec<Slide>,
    pub output_path: PathBuf,
    pub voice: String,
    pub transition_style: String,
    /// Seconds each transition clip is trimmed to.
    pub transition_duration: f64,
    /// Local reference images (logos, palettes) uploaded before generation.
    pub reference_images: Vec<PathBuf>,
    /// Already-hosted reference image URLs.
    pub reference_urls: Vec<String>,
    pub validate_slides: bool,
    pub max_validation_attempts: u32,
    pub min_validation_score: i32,
    pub narration_mode: NarrationMode,
    /// Custom transition prompts, addressed by transition index.
    pub transition_prompts: Vec<String>,
    /// Keep the temp directory after a successful assembly.
    pub keep_temp: bool,
}

impl PresentationConfig {
    /// Create a config with default settings for the given slides.
    pub fn new(slides: Vec<Slide>) -> Self {
        Self {
            title: None,
            slides,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            voice: DEFAULT_VOICE.to_string(),
            transition_style: DEFAULT_TRANSITION_STYLE.to_string(),
            transition_duration: DEFAULT_TRANSITION_DURATION,
            reference_images: Vec::new(),
            reference_urls: Vec::new(),
            validate_slides: false,
            max_validation_attempts: DEFAULT_MAX_VALIDATION_ATTEMPTS,
            min_validation_score: DEFAULT_MIN_VALIDATION_SCORE,
            narration_mode: NarrationMode::PerSlide,
            transition_prompts: Vec::new(),
            keep_temp: false,
        }
    }

    /// Parse a presentation from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let doc: PresentationDocument = serde_json::from_str(json)
            .map_err(|e| ConfigError::ParseError(format!("presentation JSON: {}", e)))?;
        let config = doc.into_config();
        config.validate()?;
        Ok(config)
    }

    /// Load a presentation from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of transitions this presentation needs.
    pub fn transition_count(&self) -> usize {
        self.slides.len().saturating_sub(1)
    }

    /// Custom prompt for the transition at `index`, if one was given.
    pub fn transition_prompt(&self, index: usize) -> Option<&str> {
        self.transition_prompts
            .get(index)
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
    }

    /// Reject definitions the pipeline cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slides.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "slides".to_string(),
                message: "a presentation needs at least one slide".to_string(),
            });
        }
        if !(self.transition_duration.is_finite() && self.transition_duration > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "transition_duration".to_string(),
                message: format!("must be positive, got {}", self.transition_duration),
            });
        }
        if self.max_validation_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_validation_attempts".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let Some((i, _)) = self
            .slides
            .iter()
            .enumerate()
            .find(|(_, s)| s.title.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: format!("slides[{}].title", i),
                message: "slide title must not be empty".to_string(),
            });
        }
        if let Some((i, _)) = self
            .slides
            .iter()
            .enumerate()
            .find(|(_, s)| s.narration.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: format!("slides[{}].narration", i),
                message: "narration text is empty".to_string(),
            });
        }
        Ok(())
    }
}

// -- JSON document shape --

#[derive(Debug, Deserialize)]
struct PresentationDocument {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    transition_style: Option<String>,
    #[serde(default)]
    transition_duration: Option<f64>,
    #[serde(default)]
    reference_images: Vec<PathBuf>,
    #[serde(default)]
    reference_urls: Vec<String>,
    #[serde(default)]
    output_path: Option<PathBuf>,
    #[serde(default)]
    validate_slides: bool,
    #[serde(default)]
    max_validation_attempts: Option<u32>,
    #[serde(default)]
    min_validation_score: Option<i32>,
    #[serde(default)]
    narration_mode: NarrationMode,
    #[serde(default)]
    transition_prompts: Vec<String>,
    #[serde(default)]
    keep_temp: bool,
    slides: Vec<SlideDocument>,
}

#[derive(Debug, Deserialize)]
struct SlideDocument {
    title: String,
    #[serde(default)]
    bullet_points: Option<Vec<String>>,
    #[serde(default)]
    narration: String,
    #[serde(default, alias = "visual")]
    visual_description: Option<String>,
    #[serde(default)]
    is_title_slide: Option<bool>,
}

impl SlideDocument {
    fn into_slide(self, index: usize) -> Slide {
        let bullet_points = self
            .bullet_points
            .unwrap_or_else(|| vec![self.title.clone()]);
        Slide {
            bullet_points,
            narration: self.narration,
            visual_description: self.visual_description.unwrap_or_default(),
            is_title_slide: self.is_title_slide.unwrap_or(index == 0),
            title: self.title,
        }
    }
}

impl PresentationDocument {
    fn into_config(self) -> PresentationConfig {
        let slides = self
            .slides
            .into_iter()
            .enumerate()
            .map(|(i, s)| s.into_slide(i))
            .collect();

        let mut config = PresentationConfig::new(slides);
        config.title = self.title;
        if let Some(voice) = self.voice {
            config.voice = voice;
        }
        if let Some(style) = self.transition_style {
            config.transition_style = style;
        }
        if let Some(duration) = self.transition_duration {
            config.transition_duration = duration;
        }
        if let Some(path) = self.output_path {
            config.output_path = path;
        }
        if let Some(max) = self.max_validation_attempts {
            config.max_validation_attempts = max;
        }
        if let Some(score) = self.min_validation_score {
            config.min_validation_score = score;
        }
        config.reference_images = self.reference_images;
        config.reference_urls = self.reference_urls;
        config.validate_slides = self.validate_slides;
        config.narration_mode = self.narration_mode;
        config.transition_prompts = self.transition_prompts;
        config.keep_temp = self.keep_temp;
        config
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_legacy_slide_defaults() {
        let json = r#"{
            "slides": [
                {"title": "Welcome", "visual": "Logo centered", "narration": "Hello there."},
                {"title": "Agenda", "narration": "Here is the plan."},
                {"title": "Wrap up", "narration": "Thanks.", "is_title_slide": true}
            ]
        }"#;

        let config = PresentationConfig::from_json_str(json).unwrap();
        assert_eq!(config.slides.len(), 3);

        assert_eq!(config.slides[0].bullet_points, vec!["Welcome".to_string()]);
        assert_eq!(config.slides[0].visual_description, "Logo centered");
        assert!(config.slides[0].is_title_slide);

        assert_eq!(config.slides[1].bullet_points, vec!["Agenda".to_string()]);
        assert_eq!(config.slides[1].visual_description, "");
        assert!(!config.slides[1].is_title_slide);

        assert!(config.slides[2].is_title_slide);
    }

    #[test]
    fn test_explicit_fields_win() {
        let json = r#"{
            "title": "Communities of Practice",
            "voice": "Hope",
            "transition_style": "morph",
            "transition_duration": 3.0,
            "reference_images": ["Reference Images/COP Logo.png"],
            "reference_urls": ["https://cdn.example.com/palette.png"],
            "output_path": "./out/cop.mp4",
            "validate_slides": true,
            "max_validation_attempts": 5,
            "narration_mode": "combined",
            "slides": [
                {
                    "title": "Why Join?",
                    "bullet_points": ["Grow", "Connect"],
                    "visual_description": "Arrow icon",
                    "narration": "Growth and connection.",
                    "is_title_slide": false
                }
            ]
        }"#;

        let config = PresentationConfig::from_json_str(json).unwrap();
        assert_eq!(config.title.as_deref(), Some("Communities of Practice"));
        assert_eq!(config.voice, "Hope");
        assert_eq!(config.transition_style, "morph");
        assert_eq!(config.transition_duration, 3.0);
        assert_eq!(
            config.reference_images,
            vec![PathBuf::from("Reference Images/COP Logo.png")]
        );
        assert_eq!(config.output_path, PathBuf::from("./out/cop.mp4"));
        assert!(config.validate_slides);
        assert_eq!(config.max_validation_attempts, 5);
        assert_eq!(config.narration_mode, NarrationMode::Combined);
        assert!(!config.slides[0].is_title_slide);
        assert_eq!(config.slides[0].bullet_points, vec!["Grow", "Connect"]);
    }

    #[test]
    fn test_defaults_applied() {
        let json = r#"{"slides": [{"title": "Only", "narration": "One slide."}]}"#;
        let config = PresentationConfig::from_json_str(json).unwrap();
        assert_eq!(config.voice, DEFAULT_VOICE);
        assert_eq!(config.transition_style, DEFAULT_TRANSITION_STYLE);
        assert_eq!(config.transition_duration, DEFAULT_TRANSITION_DURATION);
        assert_eq!(config.output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
        assert!(!config.validate_slides);
        assert_eq!(config.narration_mode, NarrationMode::PerSlide);
        assert_eq!(config.transition_count(), 0);
    }

    #[test]
    fn test_empty_slides_rejected() {
        let err = PresentationConfig::from_json_str(r#"{"slides": []}"#).unwrap_err();
        assert!(err.to_string().contains("at least one slide"));
    }

    #[test]
    fn test_non_positive_transition_duration_rejected() {
        let json = r#"{"transition_duration": 0, "slides": [{"title": "A", "narration": "a"}]}"#;
        let err = PresentationConfig::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("transition_duration"));
    }

    #[test]
    fn test_missing_or_blank_narration_rejected() {
        let json = r#"{"slides": [{"title": "A", "narration": "a"}, {"title": "B"}]}"#;
        match PresentationConfig::from_json_str(json).unwrap_err() {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "slides[1].narration"),
            other => panic!("unexpected error: {}", other),
        }

        let config = PresentationConfig::new(vec![
            Slide::new("A", vec![], "a", ""),
            Slide::new("B", vec![], "b", ""),
            Slide::new("C", vec![], " \n\t", ""),
        ]);
        match config.validate().unwrap_err() {
            ConfigError::InvalidValue { key, .. } => assert_eq!(key, "slides[2].narration"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = PresentationConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_visible_bullets_truncate_to_four() {
        let slide = Slide::new(
            "Many",
            (1..=6).map(|i| format!("point {}", i)).collect(),
            "narration",
            "",
        );
        assert_eq!(slide.visible_bullets().len(), MAX_BULLETS);
        assert_eq!(slide.visible_bullets()[3], "point 4");
    }

    #[test]
    fn test_transition_prompt_lookup_is_positional() {
        let mut config = PresentationConfig::new(vec![
            Slide::new("A", vec![], "a", ""),
            Slide::new("B", vec![], "b", ""),
            Slide::new("C", vec![], "c", ""),
        ]);
        config.transition_prompts = vec!["first".to_string(), "  ".to_string()];
        assert_eq!(config.transition_prompt(0), Some("first"));
        assert_eq!(config.transition_prompt(1), None);
        assert_eq!(config.transition_prompt(2), None);
        assert_eq!(config.transition_count(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.json");
        std::fs::write(
            &path,
            r#"{"slides": [{"title": "File", "narration": "From disk."}]}"#,
        )
        .unwrap();
        let config = PresentationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.slides[0].title, "File");
    }
}
