//! Worker-side metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder that exports them.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_CREATED_TOTAL: &str = "optiscam_jobs_created_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "optiscam_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "optiscam_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "optiscam_jobs_active";
    pub const STAGE_DURATION_SECONDS: &str = "optiscam_stage_duration_seconds";
    pub const STAGE_WARNINGS_TOTAL: &str = "optiscam_stage_warnings_total";
    pub const VERDICTS_TOTAL: &str = "optiscam_verdicts_total";
}

pub fn record_job_created(source: &str) {
    counter!(names::JOBS_CREATED_TOTAL, "source" => source.to_string()).increment(1);
}

pub fn record_job_completed(verdict: &str) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    counter!(names::VERDICTS_TOTAL, "verdict" => verdict.to_string()).increment(1);
}

pub fn record_job_failed(kind: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind.to_string()).increment(1);
}

pub fn job_started() {
    gauge!(names::JOBS_ACTIVE).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_ACTIVE).decrement(1.0);
}

pub fn record_stage(stage: &'static str, elapsed: Duration, warnings: usize) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(elapsed.as_secs_f64());
    if warnings > 0 {
        counter!(names::STAGE_WARNINGS_TOTAL, "stage" => stage).increment(warnings as u64);
    }
}
