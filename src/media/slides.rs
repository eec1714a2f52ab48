//! Slide image generation.
//!
//! Builds a prompt per slide and sends it to an image model. When reference
//! assets are supplied the request goes to the model's edit/compose endpoint
//! with the reference URLs attached; otherwise plain text-to-image is used.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, ProviderError, Result};
use crate::media::fal::{AssetStore, FalClient, extract_url};
use crate::presentation::Slide;
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Text-to-image model used when no references are supplied.
pub const TEXT_TO_IMAGE_MODEL: &str = "fal-ai/nano-banana-pro";
/// Reference-conditioned model used when references are supplied.
pub const EDIT_MODEL: &str = "fal-ai/nano-banana-pro/edit";

/// A single image generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRequest {
    pub prompt: String,
    /// Reference image URLs. Empty means text-only generation.
    pub reference_urls: Vec<String>,
}

impl ImageRequest {
    pub fn has_references(&self) -> bool {
        !self.reference_urls.is_empty()
    }
}

/// Trait for image generation providers.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image and return its URL.
    async fn generate(&self, request: &ImageRequest) -> std::result::Result<String, ProviderError>;

    /// Get the provider name.
    fn name(&self) -> &str;
}

/// Nano Banana Pro on fal.ai.
pub struct FalImageGenerator {
    fal: Arc<FalClient>,
}

impl FalImageGenerator {
    pub fn new(fal: Arc<FalClient>) -> Self {
        Self { fal }
    }

    fn arguments(request: &ImageRequest) -> serde_json::Value {
        let mut args = serde_json::json!({
            "prompt": request.prompt,
            "num_images": 1,
            "aspect_ratio": "16:9",
            "output_format": "png",
        });
        if request.has_references() {
            args["image_urls"] = serde_json::json!(request.reference_urls);
        }
        args
    }
}

#[async_trait]
impl ImageGenerator for FalImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> std::result::Result<String, ProviderError> {
        let model = if request.has_references() {
            EDIT_MODEL
        } else {
            TEXT_TO_IMAGE_MODEL
        };
        let response = self.fal.run(model, &Self::arguments(request)).await?;
        extract_url(&response, "/images/0/url")
    }

    fn name(&self) -> &str {
        "fal_nano_banana_pro"
    }
}

/// Visual constraints applied to every slide prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideStyle {
    /// Color palette description.
    pub palette: String,
    /// Aspect ratio label.
    pub aspect_ratio: String,
}

impl Default for SlideStyle {
    fn default() -> Self {
        Self {
            palette: "navy blue and white, with navy text on a clean white background".to_string(),
            aspect_ratio: "16:9".to_string(),
        }
    }
}

/// Build the image prompt for a slide.
pub fn build_slide_prompt(slide: &Slide, style: &SlideStyle) -> String {
    let bullets = slide.visible_bullets();
    let mut prompt = String::new();

    if slide.is_title_slide {
        prompt.push_str(&format!(
            "Create a professional {} presentation title slide.\n",
            style.aspect_ratio
        ));
        prompt.push_str(
            "- Center the brand mark from the reference images prominently in the middle of the slide\n",
        );
        prompt.push_str(&format!(
            "- Title: \"{}\" in large, clean text directly below the brand mark\n",
            slide.title
        ));
        if !bullets.is_empty() && !(bullets.len() == 1 && bullets[0] == slide.title) {
            prompt.push_str(&format!(
                "- Tagline in smaller text under the title: \"{}\"\n",
                bullets.join(" | ")
            ));
        }
        if !slide.visual_description.is_empty() {
            prompt.push_str(&format!("- Visual intent: {}\n", slide.visual_description));
        }
    } else {
        prompt.push_str(&format!(
            "Create a professional {} presentation slide with minimal text.\n",
            style.aspect_ratio
        ));
        prompt.push_str(&format!(
            "- Title: \"{}\" at the top in large, bold, clear text\n",
            slide.title
        ));
        if !bullets.is_empty() {
            prompt.push_str("- Bullet points on the left, short and legible, exactly as written:\n");
            for bullet in bullets {
                prompt.push_str(&format!("  * {}\n", bullet));
            }
        }
        if !slide.visual_description.is_empty() {
            prompt.push_str(&format!(
                "- Graphic on the right: {}\n",
                slide.visual_description
            ));
        }
    }

    prompt.push_str(&format!("- Color palette: {}\n", style.palette));
    prompt.push_str(&format!(
        "- Aspect ratio: {} widescreen format\n",
        style.aspect_ratio
    ));
    prompt.push_str(
        "- Graphics must be simple line-art icons only: no photographs, no 3D renders, no gradients\n",
    );
    prompt.push_str(
        "- Ensure ALL text is perfectly legible and correctly spelled; no extra words, no gibberish\n",
    );
    prompt.push_str("- Match the style, colors, and branding from any reference images provided\n");
    prompt.push_str("- Do not include slide numbers");
    prompt
}

/// Deterministic file name for slide `number` (1-based).
pub fn slide_file_name(number: usize) -> String {
    format!("slide_{:02}.png", number)
}

/// Produces slide images and writes them to disk.
pub struct SlideImageProducer {
    generator: Arc<dyn ImageGenerator>,
    store: Arc<dyn AssetStore>,
    retry: RetryPolicy,
    style: SlideStyle,
}

impl SlideImageProducer {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        store: Arc<dyn AssetStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            generator,
            store,
            retry,
            style: SlideStyle::default(),
        }
    }

    /// Override the visual constraints.
    pub fn with_style(mut self, style: SlideStyle) -> Self {
        self.style = style;
        self
    }

    pub fn style(&self) -> &SlideStyle {
        &self.style
    }

    /// Upload local reference images.
    ///
    /// Missing files and uploads that still fail after retries are skipped
    /// with a warning; references never abort slide generation.
    pub async fn upload_references(&self, paths: &[PathBuf]) -> Vec<String> {
        let mut urls = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.exists() {
                tracing::warn!(path = %path.display(), "Reference image not found, skipping");
                continue;
            }
            let label = format!("upload {}", path.display());
            match retry_with_backoff(&self.retry, &label, || self.store.upload_file(path)).await {
                Ok(url) => {
                    tracing::info!(path = %path.display(), "Uploaded reference image");
                    urls.push(url);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Reference upload failed, skipping");
                }
            }
        }
        urls
    }

    /// Generate slide `number` (1-based) into `out_dir/slide_NN.png`.
    pub async fn produce(
        &self,
        slide: &Slide,
        number: usize,
        out_dir: &Path,
        reference_images: &[PathBuf],
        reference_urls: &[String],
    ) -> Result<PathBuf> {
        let mut urls = reference_urls.to_vec();
        if !reference_images.is_empty() {
            urls.extend(self.upload_references(reference_images).await);
        }
        if urls.is_empty() && (!reference_images.is_empty() || !reference_urls.is_empty()) {
            tracing::warn!("No valid reference images found, using text-only generation");
        }

        let dest = out_dir.join(slide_file_name(number));
        self.render(slide, &urls, &dest).await?;
        Ok(dest)
    }

    /// Generate a slide with already-uploaded reference URLs into `dest`.
    pub async fn render(&self, slide: &Slide, reference_urls: &[String], dest: &Path) -> Result<()> {
        let request = ImageRequest {
            prompt: build_slide_prompt(slide, &self.style),
            reference_urls: reference_urls.to_vec(),
        };

        let label = format!("image {}", slide.title);
        let url = retry_with_backoff(&self.retry, &label, || self.generator.generate(&request))
            .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(MediaError::from)?;
        }
        retry_with_backoff(&self.retry, "download slide", || self.store.download(&url, dest))
            .await?;
        Ok(())
    }

    /// Generate every slide, uploading shared references once.
    pub async fn produce_batch(
        &self,
        slides: &[Slide],
        out_dir: &Path,
        reference_images: &[PathBuf],
        reference_urls: &[String],
    ) -> Result<Vec<PathBuf>> {
        let mut urls = reference_urls.to_vec();
        if !reference_images.is_empty() {
            tracing::info!(count = reference_images.len(), "Uploading reference images");
            urls.extend(self.upload_references(reference_images).await);
        }
        if urls.is_empty() && !reference_images.is_empty() {
            tracing::warn!("No valid reference images found, using text-only generation");
        }

        let total = slides.len();
        let mut paths = Vec::with_capacity(total);
        for (i, slide) in slides.iter().enumerate() {
            let number = i + 1;
            tracing::info!(slide = number, total, title = %slide.title, "Generating slide");
            let dest = out_dir.join(slide_file_name(number));
            self.render(slide, &urls, &dest).await?;
            tracing::info!(path = %dest.display(), "Saved slide");
            paths.push(dest);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingGenerator {
        requests: Mutex<Vec<ImageRequest>>,
    }

    #[async_trait]
    impl ImageGenerator for RecordingGenerator {
        async fn generate(
            &self,
            request: &ImageRequest,
        ) -> std::result::Result<String, ProviderError> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(format!("https://cdn.test/image_{}.png", requests.len()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct LocalStore {
        uploads: Mutex<Vec<PathBuf>>,
        reject: Option<&'static str>,
    }

    #[async_trait]
    impl AssetStore for LocalStore {
        async fn upload_file(&self, path: &Path) -> std::result::Result<String, ProviderError> {
            self.uploads.lock().unwrap().push(path.to_path_buf());
            if self.reject.is_some_and(|name| path.ends_with(name)) {
                return Err(ProviderError::RequestFailed {
                    provider: "local".to_string(),
                    reason: "storage unavailable".to_string(),
                });
            }
            Ok(format!(
                "https://cdn.test/refs/{}",
                path.file_name().unwrap().to_string_lossy()
            ))
        }

        async fn download(&self, url: &str, dest: &Path) -> std::result::Result<(), ProviderError> {
            std::fs::write(dest, url.as_bytes())?;
            Ok(())
        }
    }

    fn producer() -> (SlideImageProducer, Arc<RecordingGenerator>, Arc<LocalStore>) {
        producer_rejecting(None)
    }

    fn producer_rejecting(
        reject: Option<&'static str>,
    ) -> (SlideImageProducer, Arc<RecordingGenerator>, Arc<LocalStore>) {
        let generator = Arc::new(RecordingGenerator {
            requests: Mutex::new(Vec::new()),
        });
        let store = Arc::new(LocalStore {
            uploads: Mutex::new(Vec::new()),
            reject,
        });
        let producer =
            SlideImageProducer::new(generator.clone(), store.clone(), RetryPolicy::immediate(1));
        (producer, generator, store)
    }

    fn slide(title: &str) -> Slide {
        Slide::new(
            title,
            vec!["Monthly meetings".to_string(), "Flexible agenda".to_string()],
            "narration",
            "Line-art calendar icon",
        )
    }

    #[test]
    fn test_prompt_contains_content_and_constraints() {
        let prompt = build_slide_prompt(&slide("How It Works"), &SlideStyle::default());
        assert!(prompt.contains("\"How It Works\""));
        assert!(prompt.contains("* Monthly meetings"));
        assert!(prompt.contains("* Flexible agenda"));
        assert!(prompt.contains("Line-art calendar icon"));
        assert!(prompt.contains("16:9"));
        assert!(prompt.contains("line-art icons only"));
        assert!(prompt.contains("correctly spelled"));
        assert!(!prompt.contains("brand mark"));
    }

    #[test]
    fn test_title_slide_prompt_centers_brand_mark() {
        let prompt = build_slide_prompt(
            &slide("Communities of Practice").title_slide(true),
            &SlideStyle::default(),
        );
        assert!(prompt.contains("title slide"));
        assert!(prompt.contains("brand mark"));
        assert!(prompt.contains("Monthly meetings | Flexible agenda"));
    }

    #[test]
    fn test_prompt_truncates_bullets() {
        let mut s = slide("Many");
        s.bullet_points = (1..=6).map(|i| format!("item {}", i)).collect();
        let prompt = build_slide_prompt(&s, &SlideStyle::default());
        assert!(prompt.contains("item 4"));
        assert!(!prompt.contains("item 5"));
    }

    #[test]
    fn test_slide_file_name() {
        assert_eq!(slide_file_name(1), "slide_01.png");
        assert_eq!(slide_file_name(12), "slide_12.png");
    }

    #[test]
    fn test_fal_arguments_include_references_only_when_present() {
        let text_only = FalImageGenerator::arguments(&ImageRequest {
            prompt: "p".to_string(),
            reference_urls: vec![],
        });
        assert!(text_only.get("image_urls").is_none());
        assert_eq!(text_only["aspect_ratio"], "16:9");

        let with_refs = FalImageGenerator::arguments(&ImageRequest {
            prompt: "p".to_string(),
            reference_urls: vec!["https://cdn.test/logo.png".to_string()],
        });
        assert_eq!(with_refs["image_urls"][0], "https://cdn.test/logo.png");
    }

    #[tokio::test]
    async fn test_produce_text_only_writes_numbered_file() {
        let dir = tempfile::tempdir().unwrap();
        let (producer, generator, _) = producer();

        let path = producer
            .produce(&slide("Why Join?"), 2, dir.path(), &[], &[])
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("slide_02.png"));
        assert!(path.exists());
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].has_references());
    }

    #[tokio::test]
    async fn test_missing_reference_falls_back_to_text_only() {
        let dir = tempfile::tempdir().unwrap();
        let (producer, generator, store) = producer();

        producer
            .produce(
                &slide("Why Join?"),
                1,
                dir.path(),
                &[dir.path().join("missing_logo.png")],
                &[],
            )
            .await
            .unwrap();

        assert!(store.uploads.lock().unwrap().is_empty());
        assert!(!generator.requests.lock().unwrap()[0].has_references());
    }

    #[tokio::test]
    async fn test_failed_upload_skips_that_reference() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        let palette = dir.path().join("palette.png");
        std::fs::write(&logo, b"png").unwrap();
        std::fs::write(&palette, b"png").unwrap();
        let (producer, generator, _) = producer_rejecting(Some("logo.png"));

        let urls = producer.upload_references(&[logo.clone(), palette.clone()]).await;
        assert_eq!(urls, vec!["https://cdn.test/refs/palette.png".to_string()]);

        producer
            .produce(&slide("Why Join?"), 1, dir.path(), &[logo], &[])
            .await
            .unwrap();
        assert!(!generator.requests.lock().unwrap()[0].has_references());
    }

    #[tokio::test]
    async fn test_batch_uploads_references_once() {
        let dir = tempfile::tempdir().unwrap();
        let logo = dir.path().join("logo.png");
        std::fs::write(&logo, b"png").unwrap();
        let (producer, generator, store) = producer();

        let slides = vec![slide("One"), slide("Two"), slide("Three")];
        let paths = producer
            .produce_batch(
                &slides,
                dir.path(),
                &[logo.clone()],
                &["https://cdn.test/palette.png".to_string()],
            )
            .await
            .unwrap();

        assert_eq!(paths.len(), 3);
        assert_eq!(store.uploads.lock().unwrap().as_slice(), &[logo]);
        let requests = generator.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        for request in requests.iter() {
            assert_eq!(
                request.reference_urls,
                vec![
                    "https://cdn.test/palette.png".to_string(),
                    "https://cdn.test/refs/logo.png".to_string()
                ]
            );
        }
    }
}
