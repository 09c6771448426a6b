//! Job status state machine.
//!
//! Status only ever moves forward:
//! `Pending -> (Downloading) -> Running -> Done | Error`, and any non-terminal
//! state may fail into `Error`.

use serde::{Deserialize, Serialize};

/// Analysis job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is recorded and waiting for its background task
    #[default]
    Pending,
    /// Remote source is being fetched
    Downloading,
    /// Extraction pipeline is running
    Running,
    /// Pipeline completed and a result is attached
    Done,
    /// Job failed with an error message
    Error,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Pending, Running) | (Downloading, Running) => true,
            (Running, Done) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
