//! The per-job analysis pipeline.
//!
//! Stages run strictly in order, one at a time:
//! sample -> text -> audio -> fuse -> (visual) -> classify -> report.
//! Cancellation is observed at every stage boundary, between sampled frames,
//! and inside audio extraction.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use optiscam_media::{FrameSampler, MediaBackend};
use optiscam_ml_client::{SpeechRecognizer, TextRecognizer, VisionLanguageModel};
use optiscam_models::{AnalysisMode, AnalysisOptions, AnalysisResult, JobId, JobStatus};

use crate::cancel::CancelToken;
use crate::classifier::{ClassifierAdapter, HolisticContext};
use crate::config::PipelineConfig;
use crate::error::WorkerResult;
use crate::extract::{AudioSignalExtractor, TextSignalExtractor};
use crate::fusion::TimelineFuser;
use crate::logging::JobLogger;
use crate::metrics;
use crate::report::ReportWriter;

/// External collaborators the pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaBackend>,
    pub text: Arc<dyn TextRecognizer>,
    pub speech: Arc<dyn SpeechRecognizer>,
    pub vlm: Arc<dyn VisionLanguageModel>,
}

/// Inputs for one pipeline run.
pub struct PipelineInput<'a> {
    pub job_id: &'a JobId,
    /// Locally staged video
    pub video: &'a Path,
    /// Job-owned scratch directory for frames and audio
    pub scratch_dir: &'a Path,
    /// Human-readable source label for reports
    pub source_label: &'a str,
    pub options: &'a AnalysisOptions,
}

pub struct AnalysisPipeline {
    media: Arc<dyn MediaBackend>,
    text: TextSignalExtractor,
    audio: AudioSignalExtractor,
    fuser: TimelineFuser,
    classifier: ClassifierAdapter,
    reports: Option<ReportWriter>,
    config: PipelineConfig,
}

impl AnalysisPipeline {
    pub fn new(collaborators: Collaborators, config: PipelineConfig, report_dir: Option<PathBuf>) -> Self {
        Self {
            text: TextSignalExtractor::new(
                collaborators.text,
                config.ocr_fallback_enabled,
                config.ocr_fallback_threshold,
            ),
            audio: AudioSignalExtractor::new(
                Arc::clone(&collaborators.media),
                collaborators.speech,
                config.whisper_language.clone(),
            ),
            fuser: TimelineFuser::new(config.dedupe_text),
            classifier: ClassifierAdapter::new(collaborators.vlm, config.classifier_max_frames),
            reports: report_dir.map(ReportWriter::new),
            media: collaborators.media,
            config,
        }
    }

    /// Run every stage and build the result.
    pub async fn run(
        &self,
        input: PipelineInput<'_>,
        cancel: &CancelToken,
        logger: &JobLogger,
    ) -> WorkerResult<AnalysisResult> {
        let mode = input.options.mode;
        let mut warnings = Vec::new();

        // Sample
        cancel.check()?;
        let started = Instant::now();
        let sampler = FrameSampler::new(self.config.sampler_config(mode)).with_cancel(cancel.signal());
        let frames = sampler
            .sample(self.media.as_ref(), input.video, input.scratch_dir)
            .await?;
        self.finish_stage(logger, "sample", started, 0, &format!("{} frames retained", frames.len()));

        // Text
        cancel.check()?;
        let started = Instant::now();
        let before = warnings.len();
        let timeline = self.text.extract(&frames).await.into_result(&mut warnings)?;
        self.finish_stage(
            logger,
            "text",
            started,
            warnings.len() - before,
            &format!("{} detections", timeline.len()),
        );

        // Audio
        cancel.check()?;
        let started = Instant::now();
        let before = warnings.len();
        let transcript = self
            .audio
            .extract(input.video, input.scratch_dir, cancel)
            .await
            .into_result(&mut warnings)?;
        let segment_count = transcript.as_ref().map_or(0, |t| t.segments.len());
        self.finish_stage(
            logger,
            "audio",
            started,
            warnings.len() - before,
            &format!("{} segments", segment_count),
        );

        // Fuse
        cancel.check()?;
        let started = Instant::now();
        let segments = transcript.as_ref().map(|t| t.segments.as_slice()).unwrap_or(&[]);
        let mut fused = self.fuser.fuse(&frames, &timeline, segments);
        self.finish_stage(logger, "fuse", started, 0, &format!("{} contexts", fused.len()));

        // Per-frame visual analysis
        if self.config.analyze_frames {
            cancel.check()?;
            let started = Instant::now();
            let before = warnings.len();
            for ctx in fused.iter_mut() {
                cancel.check()?;
                match self.classifier.describe_frame(ctx).await {
                    Ok(analysis) => ctx.visual_analysis = Some(analysis),
                    Err(e) => warnings.push(format!(
                        "visual analysis failed for frame {}: {}",
                        ctx.frame_index, e
                    )),
                }
            }
            self.finish_stage(logger, "visual", started, warnings.len() - before, "frames described");
        }

        // Classify
        cancel.check()?;
        let started = Instant::now();
        let holistic = match mode {
            AnalysisMode::Holistic => HolisticContext {
                transcript: transcript.as_ref().map(|t| t.text.clone()),
                screen_text: Some(timeline.combined_text(self.config.dedupe_text)),
            },
            AnalysisMode::Standard => HolisticContext::default(),
        };
        let frame_paths: Vec<PathBuf> = frames.iter().map(|f| f.image_path.clone()).collect();
        let classification = self
            .classifier
            .classify(&frame_paths, input.options, &holistic)
            .await?;
        if classification.confidence.is_none() {
            warnings.push("classifier confidence unavailable".to_string());
        }
        self.finish_stage(
            logger,
            "classify",
            started,
            0,
            &format!("verdict {}", classification.verdict.as_str()),
        );

        let mut result = AnalysisResult {
            verdict: classification.verdict,
            confidence: classification.confidence,
            reasoning: classification.reasoning,
            mode,
            title: input.options.title.clone(),
            description: input.options.description.clone(),
            frames_sampled: frames.len(),
            detections: timeline.ordered_detections(),
            transcription: transcript,
            fused_contexts: fused,
            status: JobStatus::Done,
            warnings,
            report_dir: None,
            completed_at: Utc::now(),
        };

        // Report
        if let Some(writer) = &self.reports {
            cancel.check()?;
            let started = Instant::now();
            result.report_dir = Some(writer.job_dir(input.job_id));
            match writer.write(input.job_id, input.source_label, &result).await {
                Ok(_) => self.finish_stage(logger, "report", started, 0, "written"),
                Err(e) => {
                    result.report_dir = None;
                    result.warnings.push(format!("report could not be written: {}", e));
                    logger.log_warning(&format!("Report write failed: {}", e));
                }
            }
        }

        for w in &result.warnings {
            logger.log_warning(w);
        }
        Ok(result)
    }

    fn finish_stage(&self, logger: &JobLogger, stage: &'static str, started: Instant, warnings: usize, detail: &str) {
        let elapsed = started.elapsed();
        metrics::record_stage(stage, elapsed, warnings);
        logger.log_stage(stage, elapsed, detail);
    }
}
