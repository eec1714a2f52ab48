//! Slide quality validation.
//!
//! A vision model inspects each generated slide for garbled text and broken
//! graphics and answers through a forced `slide_validation` tool call. The
//! generate-validate loop keeps regenerating until a slide is acceptable or
//! the attempt budget runs out, in which case the best-scoring attempt wins.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, Result};
use crate::media::fal::mime_for_path;
use crate::media::vision::{ImageSource, StructuredOutput, VisionProvider, VisionRequest};
use crate::retry::{RetryPolicy, retry_with_backoff};

/// Name of the forced tool the vision model answers through.
pub const VALIDATION_TOOL: &str = "slide_validation";

/// Rendering quality grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Good,
    Acceptable,
    Poor,
}

/// What the validator suggests doing with a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Approve,
    Regenerate,
    ManualReview,
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Approve => "approve",
            Self::Regenerate => "regenerate",
            Self::ManualReview => "manual_review",
        };
        write!(f, "{}", s)
    }
}

/// Verdict on one slide image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub text_quality: Quality,
    pub text_issues: Vec<String>,
    pub graphics_quality: Quality,
    pub graphics_issues: Vec<String>,
    /// 1-10, 0 when the model gave no usable answer.
    pub overall_score: i32,
    pub recommendation: Recommendation,
    pub details: String,
}

impl ValidationResult {
    /// Failing verdict used when the model response carries no usable payload.
    pub fn unstructured_failure() -> Self {
        Self {
            is_valid: false,
            text_quality: Quality::Poor,
            text_issues: vec!["Validation failed - no structured response".to_string()],
            graphics_quality: Quality::Poor,
            graphics_issues: Vec::new(),
            overall_score: 0,
            recommendation: Recommendation::Regenerate,
            details: "Failed to get structured validation response from the vision model"
                .to_string(),
        }
    }

    /// Whether this verdict clears `min_score` without asking for regeneration.
    pub fn is_acceptable(&self, min_score: i32) -> bool {
        self.overall_score >= min_score && self.recommendation != Recommendation::Regenerate
    }
}

/// JSON schema of the `slide_validation` tool input.
pub fn validation_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "is_valid": {
                "type": "boolean",
                "description": "Whether the slide passes validation"
            },
            "text_quality": {
                "type": "string",
                "enum": ["good", "acceptable", "poor"],
                "description": "Quality of text rendering"
            },
            "text_issues": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Text-related issues found"
            },
            "graphics_quality": {
                "type": "string",
                "enum": ["good", "acceptable", "poor"],
                "description": "Quality of graphics and icons"
            },
            "graphics_issues": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Graphics-related issues found"
            },
            "overall_score": {
                "type": "integer",
                "description": "Overall quality score from 1-10"
            },
            "recommendation": {
                "type": "string",
                "enum": ["approve", "regenerate", "manual_review"],
                "description": "Recommended action"
            },
            "details": {
                "type": "string",
                "description": "Explanation of the verdict"
            }
        },
        "required": [
            "is_valid",
            "text_quality",
            "text_issues",
            "graphics_quality",
            "graphics_issues",
            "overall_score",
            "recommendation",
            "details"
        ],
        "additionalProperties": false
    })
}

/// Build the inspection prompt for a slide with the given expected content.
pub fn build_validation_prompt(title: &str, bullets: &[String]) -> String {
    let mut expected = format!("- Title: \"{}\"", title);
    if !bullets.is_empty() {
        expected.push_str("\n- Expected bullet points:");
        for bullet in bullets {
            expected.push_str(&format!("\n  - {}", bullet));
        }
    }

    format!(
        "Analyze this presentation slide image for quality issues.

Expected content:
{expected}

Check for these issues:
1. TEXT QUALITY:
   - Is the title readable and correctly spelled?
   - Are the bullet points readable and correctly spelled?
   - Is there any gibberish, corrupted text or AI artifacts?
   - Is there any \"alien lettering\" or nonsense characters?

2. GRAPHICS QUALITY:
   - Are icons and symbols clear and recognizable?
   - Are there distorted or corrupted graphics?
   - Is the overall visual design professional?

3. OVERALL ASSESSMENT:
   - Would this slide be acceptable in a professional presentation?
   - Score from 1-10 (10 = perfect, 7+ = acceptable, below 7 = needs regeneration)

Submit your verdict with the {tool} tool.",
        tool = VALIDATION_TOOL
    )
}

/// Inspects slide images through a vision provider.
pub struct SlideValidator {
    vision: Arc<dyn VisionProvider>,
    retry: RetryPolicy,
}

impl SlideValidator {
    pub fn new(vision: Arc<dyn VisionProvider>, retry: RetryPolicy) -> Self {
        Self { vision, retry }
    }

    /// Validate one slide image against its expected title and bullets.
    ///
    /// Transport failures propagate after retries. A response without a
    /// well-formed tool payload yields [`ValidationResult::unstructured_failure`].
    pub async fn validate(
        &self,
        image: &Path,
        title: &str,
        bullets: &[String],
    ) -> Result<ValidationResult> {
        let bytes = tokio::fs::read(image).await.map_err(|_| MediaError::NotFound {
            path: image.to_path_buf(),
        })?;

        let request = VisionRequest {
            image: ImageSource::Base64 {
                data: STANDARD.encode(&bytes),
                media_type: mime_for_path(image),
            },
            prompt: build_validation_prompt(title, bullets),
            structured_output: Some(StructuredOutput {
                name: VALIDATION_TOOL.to_string(),
                description: "Submit the validation result for the slide image".to_string(),
                schema: validation_schema(),
            }),
            max_tokens: Some(1024),
        };

        let response =
            retry_with_backoff(&self.retry, "validate slide", || self.vision.analyze(&request))
                .await?;

        let result = match response.structured {
            Some(payload) => serde_json::from_value::<ValidationResult>(payload)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Malformed validation payload");
                    ValidationResult::unstructured_failure()
                }),
            None => {
                tracing::warn!(provider = %response.provider, "Vision model returned no verdict");
                ValidationResult::unstructured_failure()
            }
        };
        Ok(result)
    }

    /// Generate a slide and validate it, regenerating until it is acceptable.
    ///
    /// `generate` receives the 1-based attempt number and returns the image
    /// path it wrote. The first acceptable attempt is returned immediately;
    /// otherwise the highest-scoring attempt is returned (ties keep the
    /// earliest).
    pub async fn validate_with_retry<G, Fut>(
        &self,
        mut generate: G,
        title: &str,
        bullets: &[String],
        max_attempts: u32,
        min_score: i32,
    ) -> Result<(PathBuf, ValidationResult)>
    where
        G: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<PathBuf>>,
    {
        let mut state = ValidationLoop::new(max_attempts, min_score);

        while let Some(attempt) = state.next_attempt() {
            tracing::info!(attempt, max_attempts, title, "Validation attempt");
            let path = generate(attempt).await?;
            let result = self.validate(&path, title, bullets).await?;
            tracing::info!(
                score = result.overall_score,
                recommendation = %result.recommendation,
                "Slide validated"
            );
            if !result.is_acceptable(min_score) {
                if !result.text_issues.is_empty() {
                    tracing::info!(issues = ?result.text_issues, "Text issues");
                }
                if !result.graphics_issues.is_empty() {
                    tracing::info!(issues = ?result.graphics_issues, "Graphics issues");
                }
            }
            state.record(path, result);
        }

        let outcome = state.finish()?;
        if let Verdict::GiveUp = outcome.verdict {
            tracing::warn!(
                score = outcome.best.result.overall_score,
                "No attempt passed validation, using best attempt"
            );
        }
        Ok((outcome.best.path, outcome.best.result))
    }
}

/// One generated image together with its verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct BestAttempt {
    pub attempt: u32,
    pub path: PathBuf,
    pub result: ValidationResult,
}

/// How a loop ended, or what it wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Retry,
    GiveUp,
}

/// Final state of a [`ValidationLoop`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub verdict: Verdict,
    /// The accepted attempt, or the best one on give-up.
    pub best: BestAttempt,
}

/// Generate → validate → accept | retry | give up.
#[derive(Debug, Clone)]
pub struct ValidationLoop {
    max_attempts: u32,
    min_score: i32,
    attempts: u32,
    verdict: Verdict,
    best: Option<BestAttempt>,
    accepted: Option<BestAttempt>,
}

impl ValidationLoop {
    pub fn new(max_attempts: u32, min_score: i32) -> Self {
        Self {
            max_attempts,
            min_score,
            attempts: 0,
            verdict: Verdict::Retry,
            best: None,
            accepted: None,
        }
    }

    /// Number of the next attempt to run, or `None` once the loop is done.
    pub fn next_attempt(&self) -> Option<u32> {
        match self.verdict {
            Verdict::Retry if self.attempts < self.max_attempts => Some(self.attempts + 1),
            _ => None,
        }
    }

    /// Record the verdict for the current attempt and advance.
    pub fn record(&mut self, path: PathBuf, result: ValidationResult) -> Verdict {
        self.attempts += 1;
        let attempt = BestAttempt {
            attempt: self.attempts,
            path,
            result,
        };

        let improves = self
            .best
            .as_ref()
            .is_none_or(|best| attempt.result.overall_score > best.result.overall_score);
        let acceptable = attempt.result.is_acceptable(self.min_score);

        if acceptable {
            self.accepted = Some(attempt.clone());
        }
        if improves {
            self.best = Some(attempt);
        }

        self.verdict = if acceptable {
            Verdict::Accept
        } else if self.attempts >= self.max_attempts {
            Verdict::GiveUp
        } else {
            Verdict::Retry
        };
        self.verdict
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn best(&self) -> Option<&BestAttempt> {
        self.best.as_ref()
    }

    /// Consume the loop and return the chosen attempt.
    pub fn finish(self) -> Result<LoopOutcome> {
        let verdict = self.verdict;
        let best = match verdict {
            Verdict::Accept => self.accepted,
            _ => self.best,
        };
        best.map(|best| LoopOutcome {
            verdict: if verdict == Verdict::Retry {
                Verdict::GiveUp
            } else {
                verdict
            },
            best,
        })
        .ok_or_else(|| {
            MediaError::ProcessingFailed {
                reason: "validation loop finished without any attempt".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ProviderError;
    use crate::media::vision::VisionResponse;

    struct ScriptedVision {
        payloads: Mutex<VecDeque<Option<serde_json::Value>>>,
        requests: Mutex<Vec<VisionRequest>>,
    }

    impl ScriptedVision {
        fn new(payloads: Vec<Option<serde_json::Value>>) -> Arc<Self> {
            Arc::new(Self {
                payloads: Mutex::new(payloads.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VisionProvider for ScriptedVision {
        async fn analyze(
            &self,
            request: &VisionRequest,
        ) -> std::result::Result<VisionResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let structured = self.payloads.lock().unwrap().pop_front().flatten();
            Ok(VisionResponse {
                content: String::new(),
                structured,
                input_tokens: None,
                output_tokens: None,
                provider: "scripted".to_string(),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }
    }

    fn verdict(score: i32, recommendation: &str) -> serde_json::Value {
        serde_json::json!({
            "is_valid": score >= 7,
            "text_quality": "good",
            "text_issues": [],
            "graphics_quality": "acceptable",
            "graphics_issues": [],
            "overall_score": score,
            "recommendation": recommendation,
            "details": format!("score {}", score)
        })
    }

    fn result(score: i32, recommendation: Recommendation) -> ValidationResult {
        ValidationResult {
            overall_score: score,
            recommendation,
            ..ValidationResult::unstructured_failure()
        }
    }

    async fn run_loop(
        payloads: Vec<Option<serde_json::Value>>,
        max_attempts: u32,
    ) -> (PathBuf, ValidationResult, u32) {
        let dir = tempfile::tempdir().unwrap();
        let validator = SlideValidator::new(ScriptedVision::new(payloads), RetryPolicy::immediate(1));
        let calls = Mutex::new(0u32);
        let root = dir.path().to_path_buf();

        let (path, res) = validator
            .validate_with_retry(
                |attempt| {
                    *calls.lock().unwrap() += 1;
                    let path = root.join(format!("attempt_{}.png", attempt));
                    async move {
                        std::fs::write(&path, b"png").unwrap();
                        Ok::<_, crate::error::Error>(path)
                    }
                },
                "Why Join?",
                &["Networking".to_string()],
                max_attempts,
                7,
            )
            .await
            .unwrap();
        let name = path.file_name().unwrap().to_owned();
        let calls = *calls.lock().unwrap();
        (PathBuf::from(name), res, calls)
    }

    #[test]
    fn test_unstructured_failure_shape() {
        let r = ValidationResult::unstructured_failure();
        assert!(!r.is_valid);
        assert_eq!(r.overall_score, 0);
        assert_eq!(r.recommendation, Recommendation::Regenerate);
        assert_eq!(r.text_quality, Quality::Poor);
        assert_eq!(r.graphics_quality, Quality::Poor);
        assert_eq!(r.text_issues, vec!["Validation failed - no structured response"]);
    }

    #[test]
    fn test_acceptance_rule() {
        assert!(result(7, Recommendation::Approve).is_acceptable(7));
        assert!(result(9, Recommendation::ManualReview).is_acceptable(7));
        assert!(!result(9, Recommendation::Regenerate).is_acceptable(7));
        assert!(!result(6, Recommendation::Approve).is_acceptable(7));
    }

    #[test]
    fn test_schema_requires_every_field() {
        let schema = validation_schema();
        let required = schema["required"].as_array().unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert_eq!(required.len(), properties.len());
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_prompt_lists_expected_content() {
        let prompt = build_validation_prompt("Why Join?", &["Networking".to_string()]);
        assert!(prompt.contains("\"Why Join?\""));
        assert!(prompt.contains("  - Networking"));
        assert!(prompt.contains("alien lettering"));
        assert!(prompt.contains("7+ = acceptable"));

        let bare = build_validation_prompt("Title", &[]);
        assert!(!bare.contains("Expected bullet points"));
    }

    #[tokio::test]
    async fn test_validate_parses_payload_and_sends_tool() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("slide_01.png");
        std::fs::write(&image, b"png").unwrap();
        let vision = ScriptedVision::new(vec![Some(verdict(8, "approve"))]);
        let validator = SlideValidator::new(vision.clone(), RetryPolicy::immediate(1));

        let r = validator.validate(&image, "Title", &[]).await.unwrap();
        assert_eq!(r.overall_score, 8);
        assert_eq!(r.recommendation, Recommendation::Approve);

        let requests = vision.requests.lock().unwrap();
        let tool = requests[0].structured_output.as_ref().unwrap();
        assert_eq!(tool.name, VALIDATION_TOOL);
        match &requests[0].image {
            ImageSource::Base64 { media_type, data } => {
                assert_eq!(media_type, "image/png");
                assert_eq!(data, "cG5n");
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validate_missing_or_malformed_payload_fails_softly() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("slide.png");
        std::fs::write(&image, b"png").unwrap();
        let vision = ScriptedVision::new(vec![None, Some(serde_json::json!({"overall_score": "high"}))]);
        let validator = SlideValidator::new(vision, RetryPolicy::immediate(1));

        let missing = validator.validate(&image, "T", &[]).await.unwrap();
        assert_eq!(missing, ValidationResult::unstructured_failure());
        let malformed = validator.validate(&image, "T", &[]).await.unwrap();
        assert_eq!(malformed, ValidationResult::unstructured_failure());
    }

    #[tokio::test]
    async fn test_validate_missing_image_is_error() {
        let validator = SlideValidator::new(ScriptedVision::new(vec![]), RetryPolicy::immediate(1));
        let err = validator
            .validate(Path::new("/nonexistent/slide.png"), "T", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("slide.png"));
    }

    #[tokio::test]
    async fn test_retry_accepts_first_passing_attempt() {
        let (path, res, calls) = run_loop(
            vec![Some(verdict(4, "regenerate")), Some(verdict(8, "approve"))],
            3,
        )
        .await;
        assert_eq!(calls, 2);
        assert_eq!(path, PathBuf::from("attempt_2.png"));
        assert_eq!(res.overall_score, 8);
    }

    #[tokio::test]
    async fn test_retry_returns_best_when_none_pass() {
        let (path, res, calls) = run_loop(
            vec![
                Some(verdict(5, "regenerate")),
                Some(verdict(6, "regenerate")),
                Some(verdict(4, "regenerate")),
            ],
            3,
        )
        .await;
        assert_eq!(calls, 3);
        assert_eq!(path, PathBuf::from("attempt_2.png"));
        assert_eq!(res.overall_score, 6);
    }

    #[tokio::test]
    async fn test_retry_ties_keep_earliest() {
        let (path, res, _) = run_loop(
            vec![
                Some(verdict(6, "regenerate")),
                Some(verdict(6, "manual_review")),
                None,
            ],
            3,
        )
        .await;
        assert_eq!(path, PathBuf::from("attempt_1.png"));
        assert_eq!(res.overall_score, 6);
    }

    #[tokio::test]
    async fn test_high_score_with_regenerate_is_not_accepted() {
        let (path, res, calls) = run_loop(
            vec![Some(verdict(9, "regenerate")), Some(verdict(3, "regenerate"))],
            2,
        )
        .await;
        assert_eq!(calls, 2);
        assert_eq!(path, PathBuf::from("attempt_1.png"));
        assert_eq!(res.overall_score, 9);
    }

    #[test]
    fn test_loop_state_transitions() {
        let mut state = ValidationLoop::new(2, 7);
        assert_eq!(state.next_attempt(), Some(1));
        assert_eq!(
            state.record("a.png".into(), result(3, Recommendation::Regenerate)),
            Verdict::Retry
        );
        assert_eq!(state.next_attempt(), Some(2));
        assert_eq!(
            state.record("b.png".into(), result(5, Recommendation::Regenerate)),
            Verdict::GiveUp
        );
        assert_eq!(state.next_attempt(), None);
        assert_eq!(state.attempts(), 2);

        let outcome = state.finish().unwrap();
        assert_eq!(outcome.verdict, Verdict::GiveUp);
        assert_eq!(outcome.best.attempt, 2);
        assert_eq!(outcome.best.path, PathBuf::from("b.png"));
    }

    #[test]
    fn test_accepted_attempt_wins_over_higher_earlier_score() {
        let mut state = ValidationLoop::new(3, 7);
        state.record("a.png".into(), result(9, Recommendation::Regenerate));
        assert_eq!(
            state.record("b.png".into(), result(7, Recommendation::Approve)),
            Verdict::Accept
        );
        assert_eq!(state.best().unwrap().path, PathBuf::from("a.png"));
        let outcome = state.finish().unwrap();
        assert_eq!(outcome.verdict, Verdict::Accept);
        assert_eq!(outcome.best.path, PathBuf::from("b.png"));
    }

    #[test]
    fn test_empty_loop_is_error() {
        let state = ValidationLoop::new(0, 7);
        assert_eq!(state.next_attempt(), None);
        assert!(state.finish().is_err());
    }
}
