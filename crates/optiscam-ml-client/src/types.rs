//! Sidecar request/response types.

use optiscam_models::{AudioSegment, BoundingRegion};
use serde::{Deserialize, Serialize};

/// One text line found by the primary OCR tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedLine {
    /// Polygon around the line
    #[serde(rename = "box")]
    pub region: BoundingRegion,
    pub text: String,
    /// Confidence in [0, 1]
    pub confidence: f64,
}

/// Raw first-token scores for the affirmative and negative verdict tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenLogits {
    pub yes: f64,
    pub no: f64,
}

/// Output of a classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierOutput {
    /// Generated text, expected to start with Yes/No
    pub text: String,
    /// Absent when the backend does not expose token scores
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_token_logits: Option<TokenLogits>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OcrDetectRequest<'a> {
    pub image_path: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OcrDetectResponse {
    #[serde(default)]
    pub lines: Vec<RecognizedLine>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct OcrRefineRequest<'a> {
    pub image_path: &'a str,
    #[serde(rename = "box")]
    pub region: &'a BoundingRegion,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TextResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct TranscribeRequest<'a> {
    pub audio_path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TranscribeResponse {
    #[serde(default)]
    pub text: String,
    pub language: Option<String>,
    #[serde(default)]
    pub segments: Vec<SegmentDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SegmentDto {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl SegmentDto {
    pub fn into_segment(self, language: Option<&str>) -> AudioSegment {
        let segment = AudioSegment::new(self.start, self.end, self.text.trim());
        match language {
            Some(lang) => segment.with_language(lang),
            None => segment,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ClassifyRequest<'a> {
    pub image_paths: Vec<&'a str>,
    pub prompt: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DescribeRequest<'a> {
    pub image_path: &'a str,
    pub prompt: &'a str,
}

/// Health check response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub models_loaded: Option<bool>,
}
