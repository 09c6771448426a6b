//! On-screen text extraction.
//!
//! The fast OCR tier reads every frame. Lines it is unsure about are re-read
//! by the slow tier on the same region; the slow tier's text replaces the
//! fast tier's, the fast tier's confidence is kept.

use std::sync::Arc;

use optiscam_ml_client::{RecognizedLine, TextRecognizer};
use optiscam_models::{DetectionMethod, FrameRecord, TextDetection, TextTimeline};
use tracing::debug;

use crate::error::WorkerError;
use crate::stage::StageOutcome;

pub struct TextSignalExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    fallback_enabled: bool,
    fallback_threshold: f64,
}

impl TextSignalExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, fallback_enabled: bool, fallback_threshold: f64) -> Self {
        Self {
            recognizer,
            fallback_enabled,
            fallback_threshold,
        }
    }

    /// Read text from every frame, grouped by frame timestamp.
    ///
    /// A frame whose recognition fails is skipped with a warning. The stage
    /// is fatal only when every frame fails.
    pub async fn extract(&self, frames: &[FrameRecord]) -> StageOutcome<TextTimeline> {
        let mut timeline = TextTimeline::new();
        let mut warnings = Vec::new();
        let mut failed = 0usize;
        let mut last_error = None;

        for frame in frames {
            let lines = match self.recognizer.detect(&frame.image_path).await {
                Ok(lines) => lines,
                Err(e) => {
                    failed += 1;
                    warnings.push(format!(
                        "text recognition failed for frame {} at {:.2}s: {}",
                        frame.index, frame.timestamp, e
                    ));
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            for line in lines {
                if let Some(detection) = self.resolve(frame, line, &mut warnings).await {
                    timeline.insert(detection);
                }
            }
        }

        if !frames.is_empty() && failed == frames.len() {
            return StageOutcome::Fatal(WorkerError::extraction(format!(
                "text recognition failed on all {} frames: {}",
                failed,
                last_error.unwrap_or_default()
            )));
        }

        debug!(
            frames = frames.len(),
            detections = timeline.len(),
            failed,
            "Text extraction complete"
        );
        StageOutcome::from_parts(timeline, warnings)
    }

    /// Turn one primary-tier line into a detection, escalating when unsure.
    async fn resolve(
        &self,
        frame: &FrameRecord,
        line: RecognizedLine,
        warnings: &mut Vec<String>,
    ) -> Option<TextDetection> {
        let mut text = line.text.trim().to_string();
        let mut method = DetectionMethod::Primary;

        if self.fallback_enabled && line.confidence < self.fallback_threshold {
            match self.recognizer.refine(&frame.image_path, &line.region).await {
                Ok(refined) if !refined.trim().is_empty() => {
                    text = refined.trim().to_string();
                    method = DetectionMethod::PrimaryWithFallback;
                }
                Ok(_) => {}
                Err(e) => warnings.push(format!(
                    "fallback recognition failed for frame {}: {}",
                    frame.index, e
                )),
            }
        }

        if text.is_empty() {
            return None;
        }

        Some(TextDetection {
            timestamp: frame.timestamp,
            text,
            confidence: line.confidence.clamp(0.0, 1.0),
            method,
            region: line.region,
        })
    }
}
