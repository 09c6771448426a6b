//! Fused contexts, analysis options and the final result payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{JobStatus, TextDetection, Transcript};

/// How much of the video the classifier sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Dense sampling, frames only
    #[default]
    Standard,
    /// Sparse sampling plus full transcript and combined on-screen text
    Holistic,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Standard => "standard",
            AnalysisMode::Holistic => "holistic",
        }
    }

    /// Parse a form value. Accepts mode names and the boolean
    /// `holistic=true|false` flag.
    pub fn parse_flag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" | "false" | "0" | "" => Some(AnalysisMode::Standard),
            "holistic" | "true" | "1" => Some(AnalysisMode::Holistic),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied analysis parameters.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub mode: AnalysisMode,
}

impl AnalysisOptions {
    pub fn with_mode(mut self, mode: AnalysisMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Binary verdict label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Scam,
    NotScam,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Scam => "scam",
            Verdict::NotScam => "not_scam",
        }
    }

    /// Human-readable label used in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Scam => "SCAM",
            Verdict::NotScam => "NOT SCAM",
        }
    }
}

/// Everything known about one sampled moment of the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedContext {
    pub timestamp: f64,
    pub frame_index: u64,
    pub sharpness: f64,
    /// Distinct on-screen text at this timestamp, `" | "`-joined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Text of the audio segment covering this timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    pub image_path: PathBuf,
    /// Optional per-frame description from the vision-language model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_analysis: Option<String>,
}

/// Final output of a completed analysis job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub verdict: Verdict,
    /// Probability (0-100) of the emitted verdict token, when derivable
    pub confidence: Option<f64>,
    /// Free-text reasoning following the verdict token
    pub reasoning: String,
    pub mode: AnalysisMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frames_sampled: usize,
    /// Text detections, timestamp order then confidence descending
    pub detections: Vec<TextDetection>,
    /// Absent when the audio stage degraded
    pub transcription: Option<Transcript>,
    pub fused_contexts: Vec<FusedContext>,
    pub status: JobStatus,
    /// Stage-local failures that were absorbed
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn is_scam(&self) -> bool {
        self.verdict == Verdict::Scam
    }
}
