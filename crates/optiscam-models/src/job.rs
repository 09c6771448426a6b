//! Analysis job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{AnalysisOptions, AnalysisResult, JobStatus};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the job's video comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobSource {
    /// File uploaded with the request
    Upload { filename: String },
    /// Remote URL fetched by the job
    Remote { url: String },
}

impl JobSource {
    pub fn is_remote(&self) -> bool {
        matches!(self, JobSource::Remote { .. })
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            JobSource::Remote { url } => Some(url),
            JobSource::Upload { .. } => None,
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct TransitionError {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One analysis request tracked end to end.
///
/// Transitions consume the record and return a new one so that a registry
/// can swap the whole value in a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current status
    pub status: JobStatus,

    /// Video source
    pub source: JobSource,

    /// Caller-supplied parameters
    pub options: AnalysisOptions,

    /// Result (set once on Done)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,

    /// Error message (set once on Error)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// When the pipeline started running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a Pending job.
    pub fn new(source: JobSource, options: AnalysisOptions) -> Self {
        Self::with_id(JobId::new(), source, options)
    }

    pub fn with_id(id: JobId, source: JobSource, options: AnalysisOptions) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            source,
            options,
            result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    fn advance(mut self, to: JobStatus) -> Result<Self, TransitionError> {
        let from = self.status;
        let remote_only = to == JobStatus::Downloading && !self.source.is_remote();
        if !from.can_transition_to(to) || remote_only {
            return Err(TransitionError { from, to });
        }
        let now = Utc::now();
        self.status = to;
        self.updated_at = now;
        if to.is_terminal() {
            self.completed_at = Some(now);
        }
        Ok(self)
    }

    /// Remote fetch started.
    pub fn start_download(self) -> Result<Self, TransitionError> {
        self.advance(JobStatus::Downloading)
    }

    /// Media is local and the pipeline started.
    pub fn start(self) -> Result<Self, TransitionError> {
        let mut job = self.advance(JobStatus::Running)?;
        job.started_at = Some(job.updated_at);
        Ok(job)
    }

    /// Attach the result and mark Done.
    pub fn complete(self, result: AnalysisResult) -> Result<Self, TransitionError> {
        let mut job = self.advance(JobStatus::Done)?;
        job.result = Some(result);
        Ok(job)
    }

    /// Attach the error and mark Error.
    pub fn fail(self, error: impl Into<String>) -> Result<Self, TransitionError> {
        let mut job = self.advance(JobStatus::Error)?;
        job.error_message = Some(error.into());
        Ok(job)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
