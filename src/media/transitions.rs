//! Animated transitions between slides.
//!
//! Three designs are supported. Single-frame animates the outgoing slide
//! with a style prompt; line-art does the same with prompts that name the
//! slide's line-art graphics explicitly; dual-frame uploads both slides and
//! asks a reference-conditioned model to morph from the first image into the
//! second. Dual-frame is what the pipeline uses.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, ProviderError, Result};
use crate::media::fal::{AssetStore, FalClient, extract_url};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Kling 2.6 Pro image-to-video.
pub const IMAGE_TO_VIDEO_MODEL: &str = "fal-ai/kling-video/v2.6/pro/image-to-video";
/// Kling O1 reference-to-video.
pub const REFERENCE_TO_VIDEO_MODEL: &str = "fal-ai/kling-video/o1/reference-to-video";
/// Clip length requested from the video models, in seconds.
pub const CLIP_SECONDS: &str = "5";
pub const NEGATIVE_PROMPT: &str = "static, frozen, still image, no movement";

/// Named motion style for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStyle {
    #[default]
    Cinematic,
    ZoomBlur,
    Swipe,
    Shatter,
    Morph,
    Particles,
    Flip,
    Wave,
    SlideLeft,
    FadeBlur,
}

impl TransitionStyle {
    pub const ALL: [TransitionStyle; 10] = [
        Self::Cinematic,
        Self::ZoomBlur,
        Self::Swipe,
        Self::Shatter,
        Self::Morph,
        Self::Particles,
        Self::Flip,
        Self::Wave,
        Self::SlideLeft,
        Self::FadeBlur,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cinematic => "cinematic",
            Self::ZoomBlur => "zoom_blur",
            Self::Swipe => "swipe",
            Self::Shatter => "shatter",
            Self::Morph => "morph",
            Self::Particles => "particles",
            Self::Flip => "flip",
            Self::Wave => "wave",
            Self::SlideLeft => "slide_left",
            Self::FadeBlur => "fade_blur",
        }
    }

    pub fn from_str_name(s: &str) -> Option<Self> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|style| style.name() == wanted)
    }

    /// Parse a style name, falling back to cinematic with a warning.
    pub fn parse_or_default(s: &str) -> Self {
        Self::from_str_name(s).unwrap_or_else(|| {
            tracing::warn!(style = %s, "Transition style not recognized, using cinematic");
            Self::default()
        })
    }

    /// Motion prompt for animating a single frame.
    pub fn motion_prompt(&self) -> &'static str {
        match self {
            Self::Cinematic => {
                "Cinematic dissolve with subtle particles flowing across frame, elegant light streaks"
            }
            Self::ZoomBlur => {
                "Dynamic zoom blur, content rushes toward camera with motion blur effect"
            }
            Self::Swipe => "Smooth horizontal swipe with 3D parallax depth effect",
            Self::Shatter => "Elements gracefully break apart into pieces that float and scatter",
            Self::Morph => "Organic morphing, shapes smoothly flow and transform",
            Self::Particles => "Content dissolves into glowing particles that swirl outward",
            Self::Flip => "3D card flip with realistic depth and shadow",
            Self::Wave => "Ripple wave effect spreading across frame",
            Self::SlideLeft => "Content slides smoothly to the left revealing darkness",
            Self::FadeBlur => "Soft blur transition with gentle fade effect",
        }
    }

    /// Motion prompt that names the slide's line-art graphics.
    pub fn line_art_prompt(&self) -> String {
        let motion = match self {
            Self::Cinematic => "the line-art icons dissolve into drifting particles and light streaks",
            Self::ZoomBlur => "the line-art icons rush toward the camera with motion blur",
            Self::Swipe => "the line-art icons and text sweep sideways with parallax depth",
            Self::Shatter => "the line-art icons break apart into clean line fragments that float away",
            Self::Morph => "the line-art icons morph, their lines flowing and reshaping organically",
            Self::Particles => "the line-art icons scatter into glowing particles that swirl outward",
            Self::Flip => "the slide flips like a card, line-art icons catching depth and shadow",
            Self::Wave => "a ripple wave bends the line-art icons and text as it spreads",
            Self::SlideLeft => "the line-art icons and text glide smoothly off to the left",
            Self::FadeBlur => "the line-art icons soften into blur and fade gently",
        };
        format!(
            "Animated presentation graphic: {}. Keep the clean line-art style and color palette of the slide. Smooth, professional motion.",
            motion
        )
    }

    /// How the start frame turns into the end frame in a dual-frame morph.
    pub fn morph_description(&self) -> &'static str {
        match self {
            Self::Cinematic => {
                "the composition dissolves through subtle flowing particles and elegant light streaks"
            }
            Self::ZoomBlur => "the view zooms forward through a motion blur that resolves",
            Self::Swipe => "the content swipes horizontally with layered parallax depth",
            Self::Shatter => {
                "the elements break apart into floating pieces that drift and reassemble"
            }
            Self::Morph => {
                "the linework and shapes organically flow, untangle and reshape"
            }
            Self::Particles => {
                "the content dissolves into glowing particles that swirl and regroup"
            }
            Self::Flip => "the slide turns like a 3D card with realistic depth and shadow",
            Self::Wave => "a ripple wave distorts the frame and carries the elements",
            Self::SlideLeft => "the content slides smoothly to the left as new elements arrive",
            Self::FadeBlur => "the frame softens into blur and gently refocuses",
        }
    }

    /// Dual-frame prompt anchored on `@Image1` and `@Image2`.
    pub fn morph_prompt(&self) -> String {
        format!(
            "Starting from @Image1, {} into the composition shown in @Image2. \
             Text elements transition smoothly into their new positions. \
             The animation ends exactly on @Image2. Professional, fluid motion throughout.",
            self.morph_description()
        )
    }

    /// Prompt for the given design.
    pub fn prompt_for(&self, mode: TransitionMode) -> String {
        match mode {
            TransitionMode::SingleFrame => self.motion_prompt().to_string(),
            TransitionMode::LineArt => self.line_art_prompt(),
            TransitionMode::DualFrame => self.morph_prompt(),
        }
    }
}

impl std::fmt::Display for TransitionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which transition design to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    SingleFrame,
    LineArt,
    #[default]
    DualFrame,
}

/// A transition clip and the pair of slides (0-based) it bridges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionClip {
    pub from: usize,
    pub to: usize,
    pub path: PathBuf,
}

/// Deterministic file name for transition `number` (1-based).
pub fn transition_file_name(number: usize) -> String {
    format!("transition_{:02}.mp4", number)
}

/// Animate a single start frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageToVideoRequest {
    pub prompt: String,
    pub image_url: String,
}

/// Animate between reference frames addressed as `@Image1`, `@Image2`, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceVideoRequest {
    pub prompt: String,
    pub image_urls: Vec<String>,
}

/// Trait for video generation providers.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Animate one frame and return the clip URL.
    async fn image_to_video(
        &self,
        request: &ImageToVideoRequest,
    ) -> std::result::Result<String, ProviderError>;

    /// Animate between reference frames and return the clip URL.
    async fn reference_to_video(
        &self,
        request: &ReferenceVideoRequest,
    ) -> std::result::Result<String, ProviderError>;

    fn name(&self) -> &str;
}

/// Kling video models on fal.ai.
pub struct FalVideoGenerator {
    fal: Arc<FalClient>,
}

impl FalVideoGenerator {
    pub fn new(fal: Arc<FalClient>) -> Self {
        Self { fal }
    }

    fn image_arguments(request: &ImageToVideoRequest) -> serde_json::Value {
        serde_json::json!({
            "prompt": request.prompt,
            "image_url": request.image_url,
            "duration": CLIP_SECONDS,
            "aspect_ratio": "16:9",
            "cfg_scale": 0.5,
            "generate_audio": false,
            "negative_prompt": NEGATIVE_PROMPT,
        })
    }

    fn reference_arguments(request: &ReferenceVideoRequest) -> serde_json::Value {
        serde_json::json!({
            "prompt": request.prompt,
            "image_urls": request.image_urls,
            "duration": CLIP_SECONDS,
            "aspect_ratio": "16:9",
            "negative_prompt": NEGATIVE_PROMPT,
        })
    }
}

#[async_trait]
impl VideoGenerator for FalVideoGenerator {
    async fn image_to_video(
        &self,
        request: &ImageToVideoRequest,
    ) -> std::result::Result<String, ProviderError> {
        let response = self
            .fal
            .run(IMAGE_TO_VIDEO_MODEL, &Self::image_arguments(request))
            .await?;
        extract_url(&response, "/video/url")
    }

    async fn reference_to_video(
        &self,
        request: &ReferenceVideoRequest,
    ) -> std::result::Result<String, ProviderError> {
        let response = self
            .fal
            .run(REFERENCE_TO_VIDEO_MODEL, &Self::reference_arguments(request))
            .await?;
        extract_url(&response, "/video/url")
    }

    fn name(&self) -> &str {
        "fal_kling"
    }
}

fn custom_prompt_at(prompts: &[String], index: usize) -> Option<&str> {
    prompts
        .get(index)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
}

/// Produces transition clips and writes them to disk.
pub struct TransitionProducer {
    generator: Arc<dyn VideoGenerator>,
    store: Arc<dyn AssetStore>,
    retry: RetryPolicy,
}

impl TransitionProducer {
    pub fn new(
        generator: Arc<dyn VideoGenerator>,
        store: Arc<dyn AssetStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            store,
            retry,
        }
    }

    /// Morph from `from` into `to`, writing `out_dir/transition_NN.mp4`.
    ///
    /// A non-blank `custom_prompt` replaces the style template.
    pub async fn produce(
        &self,
        from: &Path,
        to: &Path,
        number: usize,
        out_dir: &Path,
        style: TransitionStyle,
        custom_prompt: Option<&str>,
    ) -> Result<PathBuf> {
        let from_url = self.upload(from).await?;
        let to_url = self.upload(to).await?;
        let dest = out_dir.join(transition_file_name(number));
        self.render_morph(&from_url, &to_url, style, custom_prompt, &dest)
            .await?;
        Ok(dest)
    }

    /// Animate `from` alone with a single-frame or line-art prompt.
    pub async fn produce_single(
        &self,
        from: &Path,
        number: usize,
        out_dir: &Path,
        style: TransitionStyle,
        mode: TransitionMode,
    ) -> Result<PathBuf> {
        let image_url = self.upload(from).await?;
        let dest = out_dir.join(transition_file_name(number));
        self.render_single(&image_url, style, mode, None, &dest)
            .await?;
        Ok(dest)
    }

    /// Generate the n-1 transitions for `slides`, pairing each slide with the next.
    ///
    /// Every slide is uploaded once. `custom_prompts` is addressed by
    /// transition index; blank or missing entries use the style template.
    pub async fn produce_batch(
        &self,
        slides: &[PathBuf],
        out_dir: &Path,
        style: TransitionStyle,
        custom_prompts: &[String],
        mode: TransitionMode,
    ) -> Result<Vec<TransitionClip>> {
        if slides.len() < 2 {
            tracing::warn!(slides = slides.len(), "Need at least 2 slides to generate transitions");
            return Ok(Vec::new());
        }
        let total = slides.len() - 1;

        // single-frame designs never read the last slide
        let needed = match mode {
            TransitionMode::DualFrame => slides.len(),
            TransitionMode::SingleFrame | TransitionMode::LineArt => total,
        };
        let mut urls = Vec::with_capacity(needed);
        for slide in &slides[..needed] {
            urls.push(self.upload(slide).await?);
        }

        let mut clips = Vec::with_capacity(total);
        for i in 0..total {
            let number = i + 1;
            let custom = custom_prompt_at(custom_prompts, i);
            tracing::info!(
                transition = number,
                total,
                %style,
                custom = custom.is_some(),
                "Generating transition"
            );
            let dest = out_dir.join(transition_file_name(number));
            match mode {
                TransitionMode::DualFrame => {
                    self.render_morph(&urls[i], &urls[i + 1], style, custom, &dest)
                        .await?
                }
                TransitionMode::SingleFrame | TransitionMode::LineArt => {
                    self.render_single(&urls[i], style, mode, custom, &dest)
                        .await?
                }
            }
            tracing::info!(path = %dest.display(), "Saved transition");
            clips.push(TransitionClip {
                from: i,
                to: i + 1,
                path: dest,
            });
        }
        Ok(clips)
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(MediaError::NotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let label = format!("upload {}", path.display());
        let url = retry_with_backoff(&self.retry, &label, || self.store.upload_file(path)).await?;
        Ok(url)
    }

    async fn render_morph(
        &self,
        from_url: &str,
        to_url: &str,
        style: TransitionStyle,
        custom_prompt: Option<&str>,
        dest: &Path,
    ) -> Result<()> {
        let request = ReferenceVideoRequest {
            prompt: custom_prompt
                .map(str::to_string)
                .unwrap_or_else(|| style.morph_prompt()),
            image_urls: vec![from_url.to_string(), to_url.to_string()],
        };
        let url = retry_with_backoff(&self.retry, "morph transition", || {
            self.generator.reference_to_video(&request)
        })
        .await?;
        self.save(&url, dest).await
    }

    async fn render_single(
        &self,
        image_url: &str,
        style: TransitionStyle,
        mode: TransitionMode,
        custom_prompt: Option<&str>,
        dest: &Path,
    ) -> Result<()> {
        let mode = match mode {
            TransitionMode::DualFrame => {
                tracing::warn!("Dual-frame needs two slides, animating the start frame only");
                TransitionMode::SingleFrame
            }
            other => other,
        };
        let request = ImageToVideoRequest {
            prompt: custom_prompt
                .map(str::to_string)
                .unwrap_or_else(|| style.prompt_for(mode)),
            image_url: image_url.to_string(),
        };
        let url = retry_with_backoff(&self.retry, "transition", || {
            self.generator.image_to_video(&request)
        })
        .await?;
        self.save(&url, dest).await
    }

    async fn save(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::from)?;
        }
        retry_with_backoff(&self.retry, "download transition", || {
            self.store.download(url, dest)
        })
        .await?;
        Ok(())
    }
}
