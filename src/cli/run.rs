//! `run`: produce a whole presentation.

use std::path::PathBuf;

use clap::Args;

use crate::cli::ModeArg;
use crate::config::Settings;
use crate::pipeline::{Pipeline, estimate_cost, find_reference_images};
use crate::presentation::PresentationConfig;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Presentation definition (JSON)
    pub presentation: PathBuf,

    /// Override the output video path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Keep intermediate clips after a successful assembly
    #[arg(long)]
    pub keep_temp: bool,

    /// Skip slide validation even if the definition enables it
    #[arg(long)]
    pub no_validate: bool,

    /// Add every image in this directory as a reference
    #[arg(long)]
    pub reference_dir: Option<PathBuf>,

    /// Transition design
    #[arg(long, value_enum, default_value_t = ModeArg::Dual)]
    pub mode: ModeArg,
}

/// Load the definition, apply command-line overrides, and run the pipeline.
pub async fn run_presentation_command(args: RunArgs) -> anyhow::Result<()> {
    let settings = Settings::from_env()?;
    let mut config = PresentationConfig::from_json_file(&args.presentation)?;
    apply_overrides(&mut config, &args)?;

    settings.validate(config.validate_slides)?;

    let chars = config.slides.iter().map(|s| s.narration.chars().count()).sum::<usize>();
    let estimate = estimate_cost(config.slides.len(), chars / config.slides.len().max(1));
    tracing::info!(total = %estimate.total.round_dp(2), "Estimated cost (USD)");

    let pipeline = Pipeline::from_settings(&settings)?.with_transition_mode(args.mode.into());
    let output = pipeline.run(&config).await?;

    println!("{}", output.display());
    Ok(())
}

fn apply_overrides(config: &mut PresentationConfig, args: &RunArgs) -> anyhow::Result<()> {
    if let Some(ref output) = args.output {
        config.output_path = output.clone();
    }
    if args.keep_temp {
        config.keep_temp = true;
    }
    if args.no_validate {
        config.validate_slides = false;
    }
    if let Some(ref dir) = args.reference_dir {
        let found = find_reference_images(dir)?;
        tracing::info!(count = found.len(), dir = %dir.display(), "Found reference images");
        config.reference_images.extend(found);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::presentation::Slide;

    fn args() -> RunArgs {
        RunArgs {
            presentation: PathBuf::from("deck.json"),
            output: None,
            keep_temp: false,
            no_validate: false,
            reference_dir: None,
            mode: ModeArg::Dual,
        }
    }

    fn config() -> PresentationConfig {
        let mut config = PresentationConfig::new(vec![Slide::new(
            "Intro",
            vec![],
            "Hello there.",
            "",
        )]);
        config.validate_slides = true;
        config
    }

    #[test]
    fn test_overrides_untouched_by_default() {
        let mut c = config();
        assert_ok!(apply_overrides(&mut c, &args()));
        assert_eq!(c, config());
    }

    #[test]
    fn test_overrides_applied() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("logo.png"), b"png").unwrap();

        let mut c = config();
        let a = RunArgs {
            output: Some(PathBuf::from("out/x.mp4")),
            keep_temp: true,
            no_validate: true,
            reference_dir: Some(tmp.path().to_path_buf()),
            ..args()
        };
        assert_ok!(apply_overrides(&mut c, &a));
        assert_eq!(c.output_path, PathBuf::from("out/x.mp4"));
        assert!(c.keep_temp);
        assert!(!c.validate_slides);
        assert_eq!(c.reference_images, vec![tmp.path().join("logo.png")]);
    }

    #[test]
    fn test_missing_reference_dir_fails() {
        let mut c = config();
        let a = RunArgs {
            reference_dir: Some(PathBuf::from("/definitely/not/here")),
            ..args()
        };
        assert_err!(apply_overrides(&mut c, &a));
    }
}
