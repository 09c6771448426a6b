//! Per-stage outcomes.
//!
//! Stages report one of three results so the pipeline can tell absorbed
//! problems from job-fatal ones without inspecting error text.

use crate::error::{WorkerError, WorkerResult};

/// Result of one pipeline stage.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Stage completed cleanly.
    Success(T),
    /// Stage produced a usable value but absorbed some failures.
    Degraded { value: T, warnings: Vec<String> },
    /// Stage failed; the job must fail.
    Fatal(WorkerError),
}

impl<T> StageOutcome<T> {
    /// `Degraded` when any warnings were collected, `Success` otherwise.
    pub fn from_parts(value: T, warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            StageOutcome::Success(value)
        } else {
            StageOutcome::Degraded { value, warnings }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StageOutcome::Fatal(_))
    }

    /// Unwrap the value, moving any warnings into `sink`.
    pub fn into_result(self, sink: &mut Vec<String>) -> WorkerResult<T> {
        match self {
            StageOutcome::Success(value) => Ok(value),
            StageOutcome::Degraded { value, warnings } => {
                sink.extend(warnings);
                Ok(value)
            }
            StageOutcome::Fatal(e) => Err(e),
        }
    }
}
