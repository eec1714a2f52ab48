//! CLI command handling.
//!
//! Provides subcommands for:
//! - Producing a full presentation video (`run`)
//! - Regenerating transitions for existing slides (`transitions`)
//! - Assembling existing artifacts with one narration track (`assemble`)
//! - Checking a single slide image (`validate`)
//! - Checking prerequisites (`doctor`)
//! - Listing voices and transition styles (`voices`, `styles`)
//! - Estimating generation cost (`estimate`)

mod catalog;
mod doctor;
mod run;
mod stages;

pub use catalog::{run_estimate_command, run_styles_command, run_voices_command};
pub use doctor::{Check, CheckStatus, check_prerequisites, run_doctor_command};
pub use run::{RunArgs, run_presentation_command};
pub use stages::{
    AssembleArgs, TransitionsArgs, ValidateArgs, load_prompts, run_assemble_command,
    run_transitions_command, run_validate_command,
};

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::media::TransitionMode;

#[derive(Parser, Debug)]
#[command(name = "slidereel")]
#[command(about = "Narrated slideshow videos from generated slides, voiceover and transitions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Produce a presentation video from a JSON definition
    Run(RunArgs),

    /// Generate morph transitions between existing slide images
    Transitions(TransitionsArgs),

    /// Assemble existing slides, transitions and one narration track
    Assemble(AssembleArgs),

    /// Check one slide image with the vision model
    Validate(ValidateArgs),

    /// Check API keys, ffmpeg/ffprobe and reference images
    Doctor {
        /// Reference image directory to check as well
        #[arg(long)]
        reference_dir: Option<PathBuf>,
    },

    /// List the known narration voices
    Voices,

    /// List the transition styles
    Styles,

    /// Estimate generation cost
    Estimate {
        /// Number of slides
        #[arg(long)]
        slides: usize,

        /// Average narration characters per slide
        #[arg(long, default_value_t = crate::pipeline::DEFAULT_NARRATION_CHARS)]
        chars: usize,
    },
}

/// Transition design as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ModeArg {
    /// Animate the outgoing slide alone
    Single,
    /// Dissolve the outgoing slide into line art
    LineArt,
    /// Morph the outgoing slide into the next one
    #[default]
    Dual,
}

impl From<ModeArg> for TransitionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Single => TransitionMode::SingleFrame,
            ModeArg::LineArt => TransitionMode::LineArt,
            ModeArg::Dual => TransitionMode::DualFrame,
        }
    }
}

/// Dispatch a parsed command to its handler.
pub async fn run_command(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run(args) => run_presentation_command(args).await,
        Command::Transitions(args) => run_transitions_command(args).await,
        Command::Assemble(args) => run_assemble_command(args).await,
        Command::Validate(args) => run_validate_command(args).await,
        Command::Doctor { reference_dir } => run_doctor_command(reference_dir.as_deref()).await,
        Command::Voices => run_voices_command(),
        Command::Styles => run_styles_command(),
        Command::Estimate { slides, chars } => run_estimate_command(slides, chars),
    }
}
