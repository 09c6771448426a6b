//! Per-job report files.
//!
//! Layout under the report root:
//!
//! ```text
//! <report_dir>/<job_id>/analysis_report.json
//! <report_dir>/<job_id>/summary.txt
//! <report_dir>/<job_id>/transcription.txt   (only with a transcript)
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use optiscam_models::{AnalysisResult, JobId, TextTimeline};
use tracing::info;

use crate::error::WorkerResult;

pub const REPORT_FILE: &str = "analysis_report.json";
pub const SUMMARY_FILE: &str = "summary.txt";
pub const TRANSCRIPT_FILE: &str = "transcription.txt";

const RULE_HEAVY: &str = "============================================================";
const RULE: &str = "------------------------------------------------------------";

/// Writes report files for completed jobs.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    root: PathBuf,
}

impl ReportWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.as_str())
    }

    /// Write all report files and return the job's report directory.
    pub async fn write(&self, job_id: &JobId, source: &str, result: &AnalysisResult) -> WorkerResult<PathBuf> {
        let dir = self.job_dir(job_id);
        tokio::fs::create_dir_all(&dir).await?;

        let json = serde_json::to_vec_pretty(result)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        tokio::fs::write(dir.join(REPORT_FILE), json).await?;
        tokio::fs::write(dir.join(SUMMARY_FILE), render_summary(source, result)).await?;

        if let Some(transcript) = result.transcription.as_ref().filter(|t| !t.segments.is_empty()) {
            tokio::fs::write(dir.join(TRANSCRIPT_FILE), transcript.to_timed_lines() + "\n").await?;
        }

        info!(job_id = %job_id, dir = %dir.display(), "Report written");
        Ok(dir)
    }
}

/// Human-readable summary of a result.
pub fn render_summary(source: &str, result: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE_HEAVY);
    let _ = writeln!(out, "OptiScam Video Analysis Report");
    let _ = writeln!(out, "{}\n", RULE_HEAVY);

    let _ = writeln!(out, "Video: {}", source);
    let _ = writeln!(out, "Analysis Time: {}", result.completed_at.to_rfc3339());
    let _ = writeln!(out, "Mode: {}", result.mode);
    let _ = writeln!(out, "Frames Analyzed: {}\n", result.frames_sampled);
    if let Some(title) = &result.title {
        let _ = writeln!(out, "Title: {}", title);
    }
    if let Some(description) = &result.description {
        let _ = writeln!(out, "Description:\n{}\n", description);
    }

    section(&mut out, "VERDICT");
    let confidence = result
        .confidence
        .map(|c| format!("{:.1}%", c))
        .unwrap_or_else(|| "unavailable".to_string());
    let _ = writeln!(out, "Verdict: {}", result.verdict.label());
    let _ = writeln!(out, "Confidence: {}", confidence);
    if !result.reasoning.is_empty() {
        let _ = writeln!(out, "Reasoning: {}", result.reasoning);
    }
    out.push('\n');

    section(&mut out, "AUDIO TRANSCRIPTION");
    match &result.transcription {
        Some(t) if !t.is_empty() => {
            let _ = writeln!(out, "Language: {}\n", t.language.as_deref().unwrap_or("unknown"));
            let _ = writeln!(out, "Transcript:\n{}\n", t.text);
        }
        _ => {
            let _ = writeln!(out, "No audio transcription available.\n");
        }
    }

    section(&mut out, "TEXT DETECTED IN FRAMES (Timeline)");
    let timeline: TextTimeline = result.detections.iter().cloned().collect();
    if timeline.is_empty() {
        let _ = writeln!(out, "No text detected.");
    }
    for ts in timeline.timestamps() {
        let _ = writeln!(out, "\n[{:.2}s]", ts);
        for d in timeline.ranked_at(ts) {
            let _ = writeln!(out, "  - {} (confidence: {:.2})", d.text, d.confidence);
        }
    }

    out.push('\n');
    section(&mut out, "FUSED MOMENTS");
    for ctx in &result.fused_contexts {
        let _ = writeln!(out, "\n[Frame {} @ {:.2}s]", ctx.frame_index, ctx.timestamp);
        if let Some(text) = &ctx.text {
            let _ = writeln!(out, "OCR Text: {}", text);
        }
        if let Some(audio) = &ctx.audio {
            let _ = writeln!(out, "Audio: {}", audio);
        }
        if let Some(analysis) = &ctx.visual_analysis {
            let _ = writeln!(out, "Analysis: {}", analysis);
        }
    }

    if !result.warnings.is_empty() {
        out.push('\n');
        section(&mut out, "WARNINGS");
        for w in &result.warnings {
            let _ = writeln!(out, "  - {}", w);
        }
    }

    let _ = writeln!(out, "\n{}", RULE_HEAVY);
    let _ = writeln!(out, "End of Report");
    let _ = writeln!(out, "{}", RULE_HEAVY);
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "{}\n{}\n{}", RULE, title, RULE);
}

/// True when every report file for a job exists.
pub fn report_complete(dir: &Path, with_transcript: bool) -> bool {
    dir.join(REPORT_FILE).is_file()
        && dir.join(SUMMARY_FILE).is_file()
        && (!with_transcript || dir.join(TRANSCRIPT_FILE).is_file())
}
