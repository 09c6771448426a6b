//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use optiscam_media::SamplerConfig;
use optiscam_models::AnalysisMode;

/// Knobs for the extraction, fusion and classification stages.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Take every Nth frame in standard mode
    pub frame_interval: u64,
    /// Take every Nth frame in holistic mode
    pub holistic_frame_interval: u64,
    pub sharpness_threshold: f64,
    pub use_sharpness_filter: bool,
    /// Cap on retained frames; extra frames are evenly dropped
    pub max_sampled_frames: Option<usize>,
    /// Frames handed to the classifier
    pub classifier_max_frames: usize,
    pub ocr_fallback_enabled: bool,
    /// Primary-tier confidence below which the fallback tier re-reads a line
    pub ocr_fallback_threshold: f64,
    /// Forced transcription language; detected when unset
    pub whisper_language: Option<String>,
    /// Ask the vision-language model to describe every fused frame
    pub analyze_frames: bool,
    /// Collapse exact-duplicate text within a timestamp
    pub dedupe_text: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_interval: 30,
            holistic_frame_interval: 60,
            sharpness_threshold: 100.0,
            use_sharpness_filter: true,
            max_sampled_frames: None,
            classifier_max_frames: 6,
            ocr_fallback_enabled: true,
            ocr_fallback_threshold: 0.5,
            whisper_language: None,
            analyze_frames: false,
            dedupe_text: true,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            frame_interval: env_or("FRAME_INTERVAL", d.frame_interval).max(1),
            holistic_frame_interval: env_or("HOLISTIC_FRAME_INTERVAL", d.holistic_frame_interval).max(1),
            sharpness_threshold: env_or("SHARPNESS_THRESHOLD", d.sharpness_threshold),
            use_sharpness_filter: env_or("USE_SHARPNESS_FILTER", d.use_sharpness_filter),
            max_sampled_frames: env_opt("MAX_SAMPLED_FRAMES"),
            classifier_max_frames: env_or("CLASSIFIER_MAX_FRAMES", d.classifier_max_frames).max(1),
            ocr_fallback_enabled: env_or("OCR_FALLBACK_ENABLED", d.ocr_fallback_enabled),
            ocr_fallback_threshold: env_or("OCR_FALLBACK_THRESHOLD", d.ocr_fallback_threshold),
            whisper_language: std::env::var("WHISPER_LANGUAGE").ok().filter(|s| !s.is_empty()),
            analyze_frames: env_or("ANALYZE_FRAMES", d.analyze_frames),
            dedupe_text: env_or("DEDUPE_TEXT", d.dedupe_text),
        }
    }

    /// Sampler settings for a job in `mode`.
    pub fn sampler_config(&self, mode: AnalysisMode) -> SamplerConfig {
        let interval = match mode {
            AnalysisMode::Standard => self.frame_interval,
            AnalysisMode::Holistic => self.holistic_frame_interval,
        };
        SamplerConfig {
            interval,
            sharpness_threshold: self.sharpness_threshold,
            use_sharpness_filter: self.use_sharpness_filter,
            max_frames: self.max_sampled_frames,
            ..SamplerConfig::default()
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Whole-pipeline timeout per job
    pub job_timeout: Duration,
    /// How long a cancelled or timed-out job may take to stop its stages
    /// before they are abandoned
    pub unwind_grace: Duration,
    /// How long finished jobs stay pollable
    pub job_retention: Duration,
    /// Staging directory for uploads, downloads and frame artifacts
    pub work_dir: PathBuf,
    /// Where per-job reports are written; reports are skipped when unset
    pub report_dir: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(1800), // 30 minutes
            unwind_grace: Duration::from_secs(10),
            job_retention: Duration::from_secs(3600),
            work_dir: PathBuf::from("/tmp/optiscam"),
            report_dir: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_jobs: env_or("WORKER_MAX_JOBS", d.max_concurrent_jobs).max(1),
            job_timeout: Duration::from_secs(env_or("WORKER_JOB_TIMEOUT", d.job_timeout.as_secs())),
            unwind_grace: Duration::from_secs(env_or("WORKER_UNWIND_GRACE", d.unwind_grace.as_secs())),
            job_retention: Duration::from_secs(env_or("WORKER_JOB_RETENTION", d.job_retention.as_secs())),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.work_dir),
            report_dir: std::env::var("WORKER_REPORT_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            pipeline: PipelineConfig::from_env(),
        }
    }
}

fn env_opt<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key).unwrap_or(default)
}
