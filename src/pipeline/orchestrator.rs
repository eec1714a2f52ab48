//! End-to-end pipeline: slides → voiceover → transitions → final video.
//!
//! Stages run strictly in order and each one finishes before the next
//! starts. Stages hand artifacts to each other by path through
//! [`ArtifactManifest`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{ConfigError, Error, MediaError, Result};
use crate::media::{
    AnthropicVisionProvider, AssemblyJob, AssetStore, COMBINED_FILE_NAME, DEFAULT_PAUSE_COUNT,
    DEFAULT_PAUSE_MARKER, FalClient, FalImageGenerator, FalSpeechSynthesizer, FalVideoGenerator,
    Ffmpeg, ImageGenerator, MediaTool, SlideImageProducer, SlideValidator, SpeechSynthesizer,
    TransitionMode, TransitionProducer, TransitionStyle, ValidationResult, VideoAssembler,
    VideoGenerator, VisionProvider, Voice, VoiceoverProducer, slide_file_name,
};
use crate::pipeline::artifacts::{ArtifactManifest, AudioArtifacts, WorkDirs};
use crate::presentation::{NarrationMode, PresentationConfig, Slide};
use crate::retry::RetryPolicy;

/// The providers a pipeline is built from.
pub struct PipelineParts {
    pub images: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub video: Arc<dyn VideoGenerator>,
    /// Needed only for presentations with slide validation on.
    pub vision: Option<Arc<dyn VisionProvider>>,
    pub store: Arc<dyn AssetStore>,
    pub media_tool: Arc<dyn MediaTool>,
    pub retry: RetryPolicy,
}

/// Sequences the producers for one presentation at a time.
pub struct Pipeline {
    slides: SlideImageProducer,
    validator: Option<SlideValidator>,
    voiceover: VoiceoverProducer,
    transitions: TransitionProducer,
    assembler: VideoAssembler,
    transition_mode: TransitionMode,
}

impl Pipeline {
    pub fn new(parts: PipelineParts) -> Self {
        Self {
            slides: SlideImageProducer::new(parts.images, parts.store.clone(), parts.retry),
            validator: parts
                .vision
                .map(|vision| SlideValidator::new(vision, parts.retry)),
            voiceover: VoiceoverProducer::new(parts.speech, parts.store.clone(), parts.retry),
            transitions: TransitionProducer::new(parts.video, parts.store, parts.retry),
            assembler: VideoAssembler::new(parts.media_tool),
            transition_mode: TransitionMode::DualFrame,
        }
    }

    /// Wire the fal.ai, Anthropic and ffmpeg implementations.
    ///
    /// The vision provider is attached only when an Anthropic key is set.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let fal = Arc::new(FalClient::new(settings)?);
        let vision: Option<Arc<dyn VisionProvider>> = match settings.anthropic_key {
            Some(_) => Some(Arc::new(AnthropicVisionProvider::new(settings)?)),
            None => None,
        };
        let media_tool: Arc<dyn MediaTool> = Arc::new(Ffmpeg::from_settings(settings)?);

        Ok(Self::new(PipelineParts {
            images: Arc::new(FalImageGenerator::new(fal.clone())),
            speech: Arc::new(FalSpeechSynthesizer::new(fal.clone())),
            video: Arc::new(FalVideoGenerator::new(fal.clone())),
            vision,
            store: fal,
            media_tool,
            retry: settings.retry,
        }))
    }

    /// Pick the transition design. Defaults to dual-frame morphs.
    pub fn with_transition_mode(mut self, mode: TransitionMode) -> Self {
        self.transition_mode = mode;
        self
    }

    pub fn transitions(&self) -> &TransitionProducer {
        &self.transitions
    }

    pub fn assembler(&self) -> &VideoAssembler {
        &self.assembler
    }

    pub fn validator(&self) -> Option<&SlideValidator> {
        self.validator.as_ref()
    }

    /// Produce the final video and return its path.
    pub async fn run(&self, config: &PresentationConfig) -> Result<PathBuf> {
        let manifest = self.run_with_manifest(config).await?;
        manifest.output.ok_or_else(|| {
            MediaError::ProcessingFailed {
                reason: "pipeline finished without an output file".to_string(),
            }
            .into()
        })
    }

    /// Produce the final video and return every artifact of the run.
    pub async fn run_with_manifest(&self, config: &PresentationConfig) -> Result<ArtifactManifest> {
        config.validate()?;
        if config.validate_slides && self.validator.is_none() {
            return Err(ConfigError::MissingRequired {
                key: "ANTHROPIC_API_KEY".to_string(),
                hint: "Slide validation is on; add ANTHROPIC_API_KEY=... to your .env file or disable validate_slides".to_string(),
            }
            .into());
        }

        let voice = Voice::resolve(&config.voice);
        let style = TransitionStyle::parse_or_default(&config.transition_style);
        let dirs = WorkDirs::create(WorkDirs::root_for_output(&config.output_path)).await?;

        tracing::info!(
            title = config.title.as_deref().unwrap_or(""),
            slides = config.slides.len(),
            %voice,
            %style,
            validate = config.validate_slides,
            output = %config.output_path.display(),
            "Starting presentation"
        );

        tracing::info!(stage = "slides", references = config.reference_images.len() + config.reference_urls.len(), "Generating slide images");
        let slide_paths = if config.validate_slides {
            self.produce_validated_slides(config, &dirs).await?
        } else {
            self.slides
                .produce_batch(
                    &config.slides,
                    &dirs.slides,
                    &config.reference_images,
                    &config.reference_urls,
                )
                .await?
        };

        tracing::info!(stage = "voiceover", %voice, mode = ?config.narration_mode, "Generating voiceover audio");
        let narrations: Vec<String> = config.slides.iter().map(|s| s.narration.clone()).collect();
        let audio = match config.narration_mode {
            NarrationMode::PerSlide => AudioArtifacts::PerSlide(
                self.voiceover
                    .produce_batch(&narrations, &dirs.audio, &voice)
                    .await?,
            ),
            NarrationMode::Combined => AudioArtifacts::Combined(
                self.voiceover
                    .produce_combined(
                        &narrations,
                        &dirs.audio,
                        COMBINED_FILE_NAME,
                        &voice,
                        DEFAULT_PAUSE_MARKER,
                        DEFAULT_PAUSE_COUNT,
                    )
                    .await?,
            ),
        };

        tracing::info!(stage = "transitions", %style, mode = ?self.transition_mode, "Generating transitions");
        let clips = self
            .transitions
            .produce_batch(
                &slide_paths,
                &dirs.transitions,
                style,
                &config.transition_prompts,
                self.transition_mode,
            )
            .await?;

        let mut manifest = ArtifactManifest::new(slide_paths, audio, clips);

        tracing::info!(stage = "assembly", "Assembling final video");
        let job = AssemblyJob::new(
            manifest.slides.clone(),
            manifest.audio.to_assembly_audio(),
            manifest.transition_paths(),
            config.output_path.clone(),
        )
        .with_temp_dir(dirs.scratch_for(manifest.run_id))
        .with_transition_duration(config.transition_duration)
        .with_cleanup(!config.keep_temp);
        let output = self.assembler.assemble(&job).await?;

        manifest.output = Some(output.clone());
        let manifest_path = manifest.save(&dirs.root).await?;
        tracing::info!(
            output = %output.display(),
            manifest = %manifest_path.display(),
            run_id = %manifest.run_id,
            "Presentation complete"
        );
        Ok(manifest)
    }

    async fn produce_validated_slides(
        &self,
        config: &PresentationConfig,
        dirs: &WorkDirs,
    ) -> Result<Vec<PathBuf>> {
        let validator = self.validator.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            key: "ANTHROPIC_API_KEY".to_string(),
            hint: "Slide validation needs a vision provider".to_string(),
        })?;

        let mut urls = config.reference_urls.clone();
        if !config.reference_images.is_empty() {
            urls.extend(self.slides.upload_references(&config.reference_images).await);
            if urls.is_empty() {
                tracing::warn!("No valid reference images found, using text-only generation");
            }
        }

        let total = config.slides.len();
        let mut paths = Vec::with_capacity(total);
        for (i, slide) in config.slides.iter().enumerate() {
            let number = i + 1;
            tracing::info!(slide = number, total, title = %slide.title, "Generating slide with validation");
            let (chosen, result) = self
                .validated_slide(validator, slide, number, &urls, &dirs.slides, config)
                .await?;

            let dest = dirs.slides.join(slide_file_name(number));
            tokio::fs::copy(&chosen, &dest)
                .await
                .map_err(MediaError::from)?;
            remove_attempts(&dirs.slides, number, config.max_validation_attempts).await;

            tracing::info!(
                slide = number,
                score = result.overall_score,
                recommendation = %result.recommendation,
                path = %dest.display(),
                "Saved slide"
            );
            paths.push(dest);
        }
        Ok(paths)
    }

    async fn validated_slide(
        &self,
        validator: &SlideValidator,
        slide: &Slide,
        number: usize,
        urls: &[String],
        out_dir: &Path,
        config: &PresentationConfig,
    ) -> Result<(PathBuf, ValidationResult)> {
        let producer = &self.slides;
        validator
            .validate_with_retry(
                |attempt| {
                    let dest = out_dir.join(attempt_file_name(number, attempt));
                    async move {
                        producer.render(slide, urls, &dest).await?;
                        Ok::<_, Error>(dest)
                    }
                },
                &slide.title,
                slide.visible_bullets(),
                config.max_validation_attempts,
                config.min_validation_score,
            )
            .await
    }
}

/// Scratch file for one validation attempt of slide `number`.
fn attempt_file_name(number: usize, attempt: u32) -> String {
    format!("slide_{:02}_attempt_{}.png", number, attempt)
}

async fn remove_attempts(dir: &Path, number: usize, max_attempts: u32) {
    for attempt in 1..=max_attempts {
        let path = dir.join(attempt_file_name(number, attempt));
        if let Err(e) = tokio::fs::remove_file(&path).await
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::debug!(path = %path.display(), error = %e, "Could not remove attempt file");
        }
    }
}
