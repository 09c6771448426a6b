//! Job polling and cancellation handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use optiscam_models::{AnalysisResult, Job, JobId, JobStatus};
use optiscam_worker::CancelOutcome;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Poll response.
///
/// `result` is present only once the job is done and `error` only once it
/// failed, so a running job never exposes a partial result.
#[derive(Debug, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        match job.status {
            JobStatus::Done => Self {
                status: job.status,
                result: job.result.clone(),
                error: None,
            },
            JobStatus::Error => Self {
                status: job.status,
                result: None,
                error: Some(job.error_message.clone().unwrap_or_else(|| "Unknown error".to_string())),
            },
            _ => Self {
                status: job.status,
                result: None,
                error: None,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancel_requested: bool,
}

/// `GET /job/:job_id`
pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> ApiResult<Json<JobStatusResponse>> {
    let id = JobId::from_string(job_id);
    let job = state
        .jobs
        .get(&id)
        .await
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    Ok(Json(JobStatusResponse::from(job.as_ref())))
}

/// `POST /job/:job_id/cancel`
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<(StatusCode, Json<CancelResponse>)> {
    let id = JobId::from_string(job_id);
    match state.jobs.cancel(&id).await {
        CancelOutcome::NotFound => Err(ApiError::not_found("Job not found")),
        CancelOutcome::AlreadyTerminal(status) => Err(ApiError::conflict(format!(
            "Job already finished with status {}",
            status
        ))),
        CancelOutcome::Requested => {
            info!(job_id = %id, "Cancellation requested");
            Ok((
                StatusCode::ACCEPTED,
                Json(CancelResponse {
                    job_id: id.to_string(),
                    cancel_requested: true,
                }),
            ))
        }
    }
}
