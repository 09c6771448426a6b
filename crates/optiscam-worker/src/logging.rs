//! Structured job logging.
//!
//! Every line carries the job id and operation so a single job can be
//! followed through the JSON log stream.

use std::time::Duration;

use optiscam_models::{JobId, JobStatus};
use tracing::{error, info, warn, Span};

/// Logger bound to one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    /// A status change on the registry record.
    pub fn log_transition(&self, from: JobStatus, to: JobStatus) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            from = %from,
            to = %to,
            "Job status changed"
        );
    }

    /// A pipeline stage finished.
    pub fn log_stage(&self, stage: &str, elapsed: Duration, detail: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage,
            elapsed_ms = elapsed.as_millis() as u64,
            "Stage {} done: {}", stage, detail
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span to instrument the job's background task with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}
