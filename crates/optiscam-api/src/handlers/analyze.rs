//! Job submission handlers.
//!
//! Both endpoints only record a Pending job and return its id; the
//! pipeline runs in the background.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Multipart, State};
use axum::Json;
use optiscam_models::{AnalysisMode, AnalysisOptions};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{sanitize_string, sanitize_title, validate_video_url};
use crate::state::AppState;

/// Fallback name for uploads without a filename.
const DEFAULT_UPLOAD_NAME: &str = "upload.mp4";

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Form body of `POST /analyze-youtube`.
#[derive(Debug, Deserialize)]
pub struct AnalyzeUrlForm {
    pub url: String,
    #[serde(default)]
    pub mode: Option<String>,
    /// Legacy boolean flag, same meaning as `mode=holistic`
    #[serde(default)]
    pub holistic: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// `POST /analyze`: multipart upload with `video` plus optional
/// `title`, `description` and `mode`/`holistic`.
pub async fn analyze_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut video: Option<(String, Vec<u8>)> = None;
    let mut options = AnalysisOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" | "file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
                let bytes = field.bytes().await?;
                video = Some((filename, bytes.to_vec()));
            }
            "title" => options.title = non_empty(sanitize_title(&field.text().await?)),
            "description" => options.description = non_empty(sanitize_string(&field.text().await?)),
            "mode" | "holistic" => options.mode = parse_mode(&field.text().await?)?,
            _ => {}
        }
    }

    let (filename, bytes) = video.ok_or_else(|| ApiError::bad_request("No video file provided"))?;
    if bytes.is_empty() {
        return Err(ApiError::bad_request("Uploaded video is empty"));
    }

    let size = bytes.len();
    let mode = options.mode;
    let job_id = state.jobs.submit_upload(&filename, bytes, options).await;
    info!(job_id = %job_id, filename = %filename, bytes = size, mode = %mode, "Upload accepted");

    Ok(Json(SubmitResponse {
        job_id: job_id.to_string(),
    }))
}

/// `POST /analyze-youtube`: form fields `url` and optional mode flag.
pub async fn analyze_remote(
    State(state): State<AppState>,
    form: Result<Form<AnalyzeUrlForm>, FormRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let Form(form) = form.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let url = validate_video_url(&form.url).into_result().map_err(|msg| {
        metrics::record_url_rejected();
        ApiError::bad_request(msg)
    })?;

    let mode = match form.mode.as_deref().or(form.holistic.as_deref()) {
        Some(flag) => parse_mode(flag)?,
        None => AnalysisMode::Standard,
    };
    let options = AnalysisOptions {
        title: form.title.as_deref().map(sanitize_title).and_then(non_empty),
        description: form.description.as_deref().map(sanitize_string).and_then(non_empty),
        mode,
    };

    let job_id = state.jobs.submit_remote(&url, options).await;
    info!(job_id = %job_id, url = %url, mode = %mode, "Remote video accepted");

    Ok(Json(SubmitResponse {
        job_id: job_id.to_string(),
    }))
}

fn parse_mode(value: &str) -> ApiResult<AnalysisMode> {
    AnalysisMode::parse_flag(value)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid mode '{}'. Use standard or holistic.", value.trim())))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
