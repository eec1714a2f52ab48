//! Doctor diagnostics CLI command.
//!
//! Checks the prerequisites a run needs and reports actionable fixes.

use std::path::Path;

use crate::config::Settings;

/// Diagnostic check result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl Check {
    fn ok(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Ok,
            message: message.into(),
            fix: None,
        }
    }

    fn warn(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Warning,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn error(name: &'static str, message: impl Into<String>, fix: impl Into<String>) -> Self {
        Self {
            name,
            status: CheckStatus::Error,
            message: message.into(),
            fix: Some(fix.into()),
        }
    }

    fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "[OK]",
            CheckStatus::Warning => "[WARN]",
            CheckStatus::Error => "[ERR]",
        }
    }
}

/// Run every prerequisite check against `settings`.
pub fn check_prerequisites(settings: &Settings, reference_dir: Option<&Path>) -> Vec<Check> {
    let mut checks = vec![
        check_version(),
        check_fal_key(settings),
        check_anthropic_key(settings),
        check_tool("ffmpeg", settings.ffmpeg_path.as_deref()),
        check_tool("ffprobe", settings.ffprobe_path.as_deref()),
    ];
    if let Some(dir) = reference_dir {
        checks.push(check_reference_dir(dir));
    }
    checks
}

/// Run diagnostics and print the report.
///
/// Returns an error when any check failed so scripts can gate on the exit code.
pub async fn run_doctor_command(reference_dir: Option<&Path>) -> anyhow::Result<()> {
    println!("slidereel doctor");
    println!("================\n");

    let settings = Settings::from_env()?;
    let checks = check_prerequisites(&settings, reference_dir);
    let errors = print_checks(&checks);

    if errors > 0 {
        println!("\nPlease fix the errors above before running a presentation.");
        anyhow::bail!("{} prerequisite check(s) failed", errors);
    }
    Ok(())
}

/// Print each check with its fix line and a summary; returns the error count.
fn print_checks(checks: &[Check]) -> usize {
    let mut errors = 0;
    let mut warnings = 0;

    for check in checks {
        println!("  {} {}: {}", check.icon(), check.name, check.message);
        if let Some(ref fix) = check.fix {
            println!("       Fix: {}", fix);
        }
        match check.status {
            CheckStatus::Error => errors += 1,
            CheckStatus::Warning => warnings += 1,
            CheckStatus::Ok => {}
        }
    }

    println!();
    println!(
        "Summary: {} checks, {} passed, {} warnings, {} errors",
        checks.len(),
        checks.len() - errors - warnings,
        warnings,
        errors
    );
    if errors == 0 && warnings == 0 {
        println!("\nAll checks passed! slidereel is ready to use.");
    }
    errors
}

fn check_version() -> Check {
    Check::ok("Version", format!("slidereel v{}", env!("CARGO_PKG_VERSION")))
}

fn check_fal_key(settings: &Settings) -> Check {
    if settings.fal_key.is_some() {
        Check::ok("FAL_KEY", "configured")
    } else {
        Check::error(
            "FAL_KEY",
            "not set (needed for slides, voiceover and transitions)",
            "Add FAL_KEY=your-actual-api-key to .env (get one at https://fal.ai/dashboard/keys)",
        )
    }
}

fn check_anthropic_key(settings: &Settings) -> Check {
    if settings.anthropic_key.is_some() {
        Check::ok(
            "ANTHROPIC_API_KEY",
            format!("configured (model {})", settings.validation_model),
        )
    } else {
        Check::warn(
            "ANTHROPIC_API_KEY",
            "not set; slide validation is unavailable",
            "Add ANTHROPIC_API_KEY=... to .env to enable validate_slides",
        )
    }
}

fn check_tool(tool: &'static str, path: Option<&Path>) -> Check {
    match path {
        Some(path) => Check::ok(tool, path.display().to_string()),
        None => Check::error(
            tool,
            "not found on PATH",
            format!(
                "Install FFmpeg (https://ffmpeg.org/download.html) or set {}_PATH",
                tool.to_ascii_uppercase()
            ),
        ),
    }
}

fn check_reference_dir(dir: &Path) -> Check {
    match crate::pipeline::find_reference_images(dir) {
        Ok(images) if images.is_empty() => Check::warn(
            "References",
            format!("{} has no png/jpg/webp images", dir.display()),
            "Add logo or palette images, or omit --reference-dir",
        ),
        Ok(images) => Check::ok(
            "References",
            format!("{} image(s) in {}", images.len(), dir.display()),
        ),
        Err(e) => Check::warn(
            "References",
            e.to_string(),
            format!("Create {} or omit --reference-dir", dir.display()),
        ),
    }
}
