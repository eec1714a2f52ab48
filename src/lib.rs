//! slidereel: narrated slideshow videos from generated slides, voiceover
//! and morph transitions.
//!
//! A presentation definition goes through four stages, strictly in order:
//! slide images, narration audio, transition clips, then ffmpeg assembly.
//! Remote generation runs against fal.ai; optional slide validation uses a
//! vision model.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod presentation;
pub mod retry;

pub use config::Settings;
pub use error::{ConfigError, Error, MediaError, ProviderError, Result};
pub use pipeline::{ArtifactManifest, Pipeline, PipelineParts};
pub use presentation::{NarrationMode, PresentationConfig, Slide};
pub use retry::RetryPolicy;
