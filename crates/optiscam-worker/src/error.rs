//! Worker error types.

use optiscam_media::MediaError;
use optiscam_models::TransitionError;
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Job-fatal failures.
///
/// Stage-local problems (one bad frame, one failed fallback read, missing
/// token scores) never become a `WorkerError`; they are recorded as warnings
/// on the result instead.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Source missing, corrupt or unfetchable, or staging write failed.
    #[error("Media ingest failed: {0}")]
    MediaIngest(String),

    /// An extraction stage failed as a whole.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The classifier call failed or its answer could not be parsed.
    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid state: {0}")]
    Transition(#[from] TransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn media_ingest(msg: impl Into<String>) -> Self {
        Self::MediaIngest(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn classification(msg: impl Into<String>) -> Self {
        Self::Classification(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::MediaIngest(_) => "media_ingest",
            WorkerError::Extraction(_) => "extraction",
            WorkerError::Classification(_) => "classification",
            WorkerError::Cancelled => "cancelled",
            WorkerError::TimedOut(_) => "timeout",
            WorkerError::ConfigError(_) => "config",
            WorkerError::JobNotFound(_) => "not_found",
            WorkerError::Transition(_) => "transition",
            WorkerError::Io(_) => "io",
        }
    }
}

impl From<MediaError> for WorkerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => WorkerError::Cancelled,
            other => WorkerError::MediaIngest(other.to_string()),
        }
    }
}
