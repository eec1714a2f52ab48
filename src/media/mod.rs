//! Media generation and assembly.
//!
//! Provides the producers the pipeline sequences:
//! - Slide images (text-to-image or reference-conditioned edit)
//! - Slide validation (vision model with structured verdict)
//! - Narration voiceover (per slide or one combined track)
//! - Transition clips (single-frame, line-art, or dual-frame morph)
//! - Final video assembly (ffmpeg)
//!
//! Every remote capability sits behind a trait so tests can swap in fakes.

mod fal;
mod slides;
mod transitions;
mod tts;
mod validation;
mod video;
mod vision;

pub use fal::{AssetStore, FalClient, extract_url, mime_for_path};
pub use slides::{
    EDIT_MODEL, FalImageGenerator, ImageGenerator, ImageRequest, SlideImageProducer, SlideStyle,
    TEXT_TO_IMAGE_MODEL, build_slide_prompt, slide_file_name,
};
pub use transitions::{
    FalVideoGenerator, IMAGE_TO_VIDEO_MODEL, ImageToVideoRequest, REFERENCE_TO_VIDEO_MODEL,
    ReferenceVideoRequest, TransitionClip, TransitionMode, TransitionProducer, TransitionStyle,
    VideoGenerator, transition_file_name,
};
pub use tts::{
    COMBINED_FILE_NAME, DEFAULT_PAUSE_COUNT, DEFAULT_PAUSE_MARKER, FalSpeechSynthesizer,
    KnownVoice, SpeechSynthesizer, TTS_MODEL, Voice, VoiceGender, VoiceoverProducer,
    join_with_pauses, narration_file_name,
};
pub use validation::{
    BestAttempt, LoopOutcome, Quality, Recommendation, SlideValidator, VALIDATION_TOOL,
    ValidationLoop, ValidationResult, Verdict, build_validation_prompt, validation_schema,
};
pub use video::{
    AssemblyAudio, AssemblyJob, DEFAULT_FPS, Ffmpeg, MediaTool, StillClip, StreamInfo,
    VideoAssembler, VideoInfo, parse_probe_output, shared_slide_duration, transition_offset,
};
pub use vision::{
    AnthropicVisionProvider, ImageSource, StructuredOutput, VisionProvider, VisionRequest,
    VisionResponse,
};
