//! Vision-language classifier adapter.
//!
//! Builds the verdict prompt, hands an evenly spread frame budget to the
//! model, parses the leading Yes/No token and derives an advisory confidence
//! from the first-token scores.

use std::path::PathBuf;
use std::sync::Arc;

use optiscam_media::even_subsample;
use optiscam_ml_client::{TokenLogits, VisionLanguageModel};
use optiscam_models::{AnalysisMode, AnalysisOptions, FusedContext, Verdict};
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};

const SCAM_DEFINITION: &str = "DEFINITION OF SCAM: A scam is strictly defined as a policy-violating deceptive \
pattern in accordance with the official Community Guidelines of the target platforms. \
Observable scam behaviors include but are not limited to: promoting get-rich-quick \
or guaranteed-return investment schemes, misleading or disguised external links, \
visual or audio impersonation of legitimate brands/officials/platforms, fake \
giveaways or prize claims, phishing for personal or financial information, \
artificial urgency tactics (e.g. 'limited time', 'act now', 'account suspended'), \
and coordinated inauthentic behavior designed to deceive viewers.\n\
DO NOT flag content solely for being promotional, opinionated, or low-quality \
unless it also exhibits the deceptive patterns above.";

const FRAME_ANALYSIS_PROMPT: &str = "Analyze this image for potential scam indicators:
1. Suspicious URLs or links
2. Fake urgency messages (limited time offers, account warnings)
3. Requests for personal information or payment
4. Impersonation of legitimate brands/services
5. Grammatical errors or unprofessional design
6. Too-good-to-be-true offers

Provide a brief analysis of any suspicious elements found.";

/// Extra context handed to the classifier in holistic mode.
#[derive(Debug, Clone, Default)]
pub struct HolisticContext {
    pub transcript: Option<String>,
    pub screen_text: Option<String>,
}

/// Parsed classifier answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub confidence: Option<f64>,
    pub reasoning: String,
}

pub struct ClassifierAdapter {
    vlm: Arc<dyn VisionLanguageModel>,
    max_frames: usize,
}

impl ClassifierAdapter {
    pub fn new(vlm: Arc<dyn VisionLanguageModel>, max_frames: usize) -> Self {
        Self {
            vlm,
            max_frames: max_frames.max(1),
        }
    }

    /// Classify the video from its frames and caller-supplied metadata.
    pub async fn classify(
        &self,
        frames: &[PathBuf],
        options: &AnalysisOptions,
        holistic: &HolisticContext,
    ) -> WorkerResult<Classification> {
        if frames.is_empty() {
            return Err(WorkerError::classification("no frames available for classification"));
        }

        let chosen = even_subsample(frames, self.max_frames);
        let prompt = build_prompt(options, holistic);
        debug!(frames = chosen.len(), mode = %options.mode, "Calling classifier");

        let output = self
            .vlm
            .classify(&chosen, &prompt)
            .await
            .map_err(|e| WorkerError::classification(e.to_string()))?;

        let (verdict, reasoning) = parse_verdict(&output.text)?;
        let confidence = output
            .first_token_logits
            .and_then(|logits| derive_confidence(logits, verdict));
        if confidence.is_none() {
            warn!("Classifier returned no usable token scores; confidence unavailable");
        }

        Ok(Classification {
            verdict,
            confidence,
            reasoning,
        })
    }

    /// Ask the model for a per-frame scam-indicator description.
    pub async fn describe_frame(&self, context: &FusedContext) -> WorkerResult<String> {
        let mut prompt = String::from(FRAME_ANALYSIS_PROMPT);
        if let Some(text) = &context.text {
            prompt.push_str(&format!("\n\nText visible in this frame: {}", text));
        }
        if let Some(audio) = &context.audio {
            prompt.push_str(&format!("\nAudio at this moment: {}", audio));
        }

        self.vlm
            .describe(&context.image_path, &prompt)
            .await
            .map(|s| s.trim().to_string())
            .map_err(|e| WorkerError::classification(e.to_string()))
    }
}

/// Prompt for the verdict call.
pub fn build_prompt(options: &AnalysisOptions, holistic: &HolisticContext) -> String {
    let mut parts = Vec::new();
    if let Some(title) = options.title.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Title: {}", title.trim()));
    }
    if let Some(desc) = options.description.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Description: {}", desc.trim()));
    }
    if options.mode == AnalysisMode::Holistic {
        if let Some(t) = holistic.transcript.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Audio Transcription: {}", t));
        }
        if let Some(t) = holistic.screen_text.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("Text Visible in Video: {}", t));
        }
    }
    parts.push(String::new());
    parts.push(SCAM_DEFINITION.to_string());
    parts.push(String::new());

    let sources = match options.mode {
        AnalysisMode::Standard => "the video frames, title, and description",
        AnalysisMode::Holistic => "the video frames, title, description, audio and on-screen text",
    };
    parts.push(format!(
        "Given the above definition, is this video a scam? Check {} for deceptive patterns. \
         Answer Yes/No followed by your reasoning in 4-5 sentences.",
        sources
    ));
    parts.join("\n")
}

/// Split classifier output into verdict and reasoning.
///
/// The verdict is the first alphabetic word, case-insensitive.
pub fn parse_verdict(output: &str) -> WorkerResult<(Verdict, String)> {
    let trimmed = output.trim_start();
    let start = trimmed
        .find(|c: char| c.is_alphabetic())
        .ok_or_else(|| WorkerError::classification("classifier returned no verdict token"))?;
    let rest = &trimmed[start..];
    let end = rest
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(rest.len());

    let verdict = match rest[..end].to_lowercase().as_str() {
        "yes" => Verdict::Scam,
        "no" => Verdict::NotScam,
        other => {
            return Err(WorkerError::classification(format!(
                "unrecognized verdict token '{}'",
                other
            )))
        }
    };

    let reasoning = rest[end..]
        .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '.' | ',' | ':' | '-' | '!' | '*'))
        .trim_end()
        .to_string();
    Ok((verdict, reasoning))
}

/// Probability (0-100) of the emitted token under a softmax over the two
/// first-token scores. `None` when the scores are not finite.
pub fn derive_confidence(logits: TokenLogits, verdict: Verdict) -> Option<f64> {
    if !logits.yes.is_finite() || !logits.no.is_finite() {
        return None;
    }
    let max = logits.yes.max(logits.no);
    let e_yes = (logits.yes - max).exp();
    let e_no = (logits.no - max).exp();
    let emitted = match verdict {
        Verdict::Scam => e_yes,
        Verdict::NotScam => e_no,
    };
    Some(emitted / (e_yes + e_no) * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use optiscam_ml_client::{ClassifierOutput, MlResult};
    use std::path::Path;
    use std::sync::Mutex;

    #[test]
    fn test_parse_verdict() {
        let (v, r) = parse_verdict("Yes. The video promises guaranteed returns.").unwrap();
        assert_eq!(v, Verdict::Scam);
        assert_eq!(r, "The video promises guaranteed returns.");

        let (v, r) = parse_verdict("  no, nothing deceptive here").unwrap();
        assert_eq!(v, Verdict::NotScam);
        assert_eq!(r, "nothing deceptive here");

        let (v, _) = parse_verdict("**Yes**").unwrap();
        assert_eq!(v, Verdict::Scam);
    }

    #[test]
    fn test_parse_verdict_rejects_ambiguous() {
        assert!(matches!(
            parse_verdict("Maybe, hard to tell"),
            Err(WorkerError::Classification(_))
        ));
        assert!(parse_verdict("Yesterday I saw").is_err());
        assert!(parse_verdict("   ").is_err());
    }

    #[test]
    fn test_derive_confidence_softmax() {
        let equal = TokenLogits { yes: 3.0, no: 3.0 };
        assert!((derive_confidence(equal, Verdict::Scam).unwrap() - 50.0).abs() < 1e-9);

        let logits = TokenLogits { yes: 2.0, no: 0.0 };
        let expected = 100.0 / (1.0 + (-2.0f64).exp());
        assert!((derive_confidence(logits, Verdict::Scam).unwrap() - expected).abs() < 1e-9);
        assert!((derive_confidence(logits, Verdict::NotScam).unwrap() - (100.0 - expected)).abs() < 1e-9);

        let huge = TokenLogits { yes: 1000.0, no: 0.0 };
        assert!((derive_confidence(huge, Verdict::Scam).unwrap() - 100.0).abs() < 1e-9);

        let bad = TokenLogits { yes: f64::NAN, no: 0.0 };
        assert!(derive_confidence(bad, Verdict::Scam).is_none());
    }

    #[test]
    fn test_holistic_prompt_includes_context() {
        let ctx = HolisticContext {
            transcript: Some("send crypto".into()),
            screen_text: Some("FREE BTC".into()),
        };
        let standard = AnalysisOptions {
            title: Some("Giveaway".into()),
            ..Default::default()
        };
        let prompt = build_prompt(&standard, &ctx);
        assert!(prompt.starts_with("Title: Giveaway"));
        assert!(!prompt.contains("send crypto"));
        assert!(prompt.ends_with("Answer Yes/No followed by your reasoning in 4-5 sentences."));

        let holistic = standard.with_mode(AnalysisMode::Holistic);
        let prompt = build_prompt(&holistic, &ctx);
        assert!(prompt.contains("Audio Transcription: send crypto"));
        assert!(prompt.contains("Text Visible in Video: FREE BTC"));
    }

    struct RecordingVlm {
        seen: Mutex<Vec<PathBuf>>,
        answer: ClassifierOutput,
    }

    #[async_trait]
    impl VisionLanguageModel for RecordingVlm {
        async fn classify(&self, images: &[PathBuf], _prompt: &str) -> MlResult<ClassifierOutput> {
            *self.seen.lock().unwrap() = images.to_vec();
            Ok(self.answer.clone())
        }

        async fn describe(&self, _image: &Path, _prompt: &str) -> MlResult<String> {
            Ok("  no indicators ".into())
        }
    }

    #[tokio::test]
    async fn test_classify_budget_and_missing_scores() {
        let vlm = Arc::new(RecordingVlm {
            seen: Mutex::new(Vec::new()),
            answer: ClassifierOutput {
                text: "No. Ordinary cooking video.".into(),
                first_token_logits: None,
            },
        });
        let adapter = ClassifierAdapter::new(vlm.clone(), 6);
        let frames: Vec<PathBuf> = (0..10).map(|i| PathBuf::from(format!("f{}.jpg", i))).collect();

        let c = adapter
            .classify(&frames, &AnalysisOptions::default(), &HolisticContext::default())
            .await
            .unwrap();

        assert_eq!(c.verdict, Verdict::NotScam);
        assert!(c.confidence.is_none());
        let seen = vlm.seen.lock().unwrap().clone();
        let names: Vec<_> = seen.iter().map(|p| p.to_string_lossy().to_string()).collect();
        assert_eq!(names, vec!["f0.jpg", "f1.jpg", "f3.jpg", "f5.jpg", "f6.jpg", "f8.jpg"]);
    }

    #[tokio::test]
    async fn test_describe_frame_trims() {
        let vlm = Arc::new(RecordingVlm {
            seen: Mutex::new(Vec::new()),
            answer: ClassifierOutput {
                text: "Yes".into(),
                first_token_logits: None,
            },
        });
        let adapter = ClassifierAdapter::new(vlm, 6);
        let ctx = FusedContext {
            timestamp: 0.0,
            frame_index: 0,
            sharpness: 120.0,
            text: Some("WIN".into()),
            audio: None,
            image_path: PathBuf::from("f0.jpg"),
            visual_analysis: None,
        };
        assert_eq!(adapter.describe_frame(&ctx).await.unwrap(), "no indicators");
    }
}
