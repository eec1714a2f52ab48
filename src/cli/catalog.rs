//! Listing commands: `voices`, `styles`, `estimate`.

use crate::media::{KnownVoice, TransitionStyle};
use crate::pipeline::estimate_cost;

pub fn run_voices_command() -> anyhow::Result<()> {
    println!("Available voices:\n");
    for voice in KnownVoice::ALL {
        println!(
            "  {:<8} {:<8} {}",
            voice.name(),
            voice.gender().to_string(),
            voice.description()
        );
    }
    println!("\nAny other value longer than 15 characters or containing a digit is sent as a raw voice id.");
    Ok(())
}

pub fn run_styles_command() -> anyhow::Result<()> {
    println!("Transition styles:\n");
    for style in TransitionStyle::ALL {
        let marker = if style == TransitionStyle::default() {
            " (default)"
        } else {
            ""
        };
        println!("  {:<11} {}{}", style.name(), style.morph_description(), marker);
    }
    Ok(())
}

pub fn run_estimate_command(slides: usize, chars: usize) -> anyhow::Result<()> {
    println!("Cost estimate for {} slides:\n", slides);
    println!("{}", estimate_cost(slides, chars));
    Ok(())
}
