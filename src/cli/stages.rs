//! Single-stage commands: `transitions`, `assemble`, `validate`.
//!
//! These rerun one pipeline stage against artifacts already on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;

use crate::cli::ModeArg;
use crate::config::Settings;
use crate::media::{
    AnthropicVisionProvider, AssemblyAudio, AssemblyJob, FalClient, FalVideoGenerator, Ffmpeg,
    SlideValidator, TransitionProducer, TransitionStyle, VideoAssembler,
};
use crate::presentation::{DEFAULT_MIN_VALIDATION_SCORE, DEFAULT_TRANSITION_DURATION};

#[derive(Args, Debug)]
pub struct TransitionsArgs {
    /// Slide images in presentation order
    #[arg(long, num_args = 1.., required = true)]
    pub slides: Vec<PathBuf>,

    /// Where transition_NN.mp4 files are written
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Transition style name
    #[arg(long, default_value = "cinematic")]
    pub style: String,

    /// Custom prompts, one per transition (JSON array or one per line)
    #[arg(long)]
    pub prompts: Option<PathBuf>,

    /// Transition design
    #[arg(long, value_enum, default_value_t = ModeArg::Dual)]
    pub mode: ModeArg,
}

#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Slide images in presentation order
    #[arg(long, num_args = 1.., required = true)]
    pub slides: Vec<PathBuf>,

    /// Narration track covering the whole presentation
    #[arg(long)]
    pub audio: PathBuf,

    /// Transition clips, one per adjacent slide pair
    #[arg(long, num_args = 0..)]
    pub transitions: Vec<PathBuf>,

    /// Final video path
    #[arg(long)]
    pub output: PathBuf,

    /// Seconds each transition is trimmed to
    #[arg(long, default_value_t = DEFAULT_TRANSITION_DURATION)]
    pub transition_duration: f64,

    /// Keep intermediate clips
    #[arg(long)]
    pub keep_temp: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Slide image to check
    pub image: PathBuf,

    /// Expected slide title
    #[arg(long)]
    pub title: String,

    /// Expected bullet point (repeatable)
    #[arg(long = "bullet")]
    pub bullets: Vec<String>,

    /// Minimum acceptable score
    #[arg(long, default_value_t = DEFAULT_MIN_VALIDATION_SCORE)]
    pub min_score: i32,
}

/// Read custom transition prompts.
///
/// `.json` files hold an array of strings; anything else is one prompt per
/// line. Blank entries keep their position and fall back to the style template.
pub fn load_prompts(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        return Ok(serde_json::from_str(&raw)?);
    }
    Ok(raw.lines().map(|l| l.trim().to_string()).collect())
}

pub async fn run_transitions_command(args: TransitionsArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    settings.require_fal_key()?;

    let style = TransitionStyle::parse_or_default(&args.style);
    let prompts = match args.prompts {
        Some(ref path) => load_prompts(path)?,
        None => Vec::new(),
    };
    tokio::fs::create_dir_all(&args.output_dir).await?;

    let fal = Arc::new(FalClient::new(&settings)?);
    let producer = TransitionProducer::new(
        Arc::new(FalVideoGenerator::new(fal.clone())),
        fal,
        settings.retry,
    );
    let clips = producer
        .produce_batch(&args.slides, &args.output_dir, style, &prompts, args.mode.into())
        .await?;

    for clip in &clips {
        println!("{} -> {}: {}", clip.from + 1, clip.to + 1, clip.path.display());
    }
    Ok(())
}

pub async fn run_assemble_command(args: AssembleArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let assembler = VideoAssembler::new(Arc::new(Ffmpeg::from_settings(&settings)?));

    let job = AssemblyJob::new(
        args.slides,
        AssemblyAudio::Shared(args.audio),
        args.transitions,
        args.output,
    )
    .with_transition_duration(args.transition_duration)
    .with_cleanup(!args.keep_temp);

    let output = assembler.assemble(&job).await?;
    let info = assembler.probe_info(&output).await?;
    println!(
        "{} ({:.1}s, {} bytes)",
        output.display(),
        info.duration_seconds.unwrap_or_default(),
        info.size_bytes.unwrap_or_default()
    );
    Ok(())
}

pub async fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let vision = AnthropicVisionProvider::new(&settings)?;
    let validator = SlideValidator::new(Arc::new(vision), settings.retry);

    let result = validator
        .validate(&args.image, &args.title, &args.bullets)
        .await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.is_acceptable(args.min_score) {
        println!("\nAcceptable (score {} >= {})", result.overall_score, args.min_score);
    } else {
        println!(
            "\nNot acceptable (score {}, recommendation {})",
            result.overall_score, result.recommendation
        );
    }
    Ok(())
}
