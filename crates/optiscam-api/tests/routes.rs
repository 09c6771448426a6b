mod common;

use axum::http::StatusCode;
use optiscam_api::ApiConfig;
use optiscam_models::JobId;
use tower::ServiceExt;

use common::{app, app_with, form_request, get, json, post, upload_request};

#[tokio::test]
async fn health_reports_version_without_calling_out() {
    let app = app();

    let response = app.router.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    let body = json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["models_loaded"], false);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn ready_is_unavailable_when_sidecar_is_down() {
    let app = app();

    let response = app.router.oneshot(get("/ready")).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["model_service"]["status"], "error");
}

#[tokio::test]
async fn upload_runs_to_done_and_poll_returns_result() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[
            ("video", Some("clip.mp4"), b"not really a video"),
            ("title", None, b"Free Bitcoin"),
            ("holistic", None, b"true"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = json(response).await["job_id"].as_str().unwrap().to_string();

    let job = app.state.jobs.wait_terminal(&JobId::from_string(&job_id)).await.unwrap();
    assert!(job.error_message.is_none(), "{:?}", job.error_message);

    let response = app.router.oneshot(get(&format!("/job/{}", job_id))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "done");
    assert!(body.get("error").is_none());
    let result = &body["result"];
    assert_eq!(result["verdict"], "scam");
    assert_eq!(result["confidence"], 50.0);
    assert_eq!(result["mode"], "holistic");
    assert_eq!(result["title"], "Free Bitcoin");
    assert_eq!(result["fused_contexts"][0]["audio"], "Act now.");

    // Staged upload and frames are gone once the job is terminal
    assert!(common_entries(app.work_dir.path()).is_empty());
}

#[tokio::test]
async fn upload_without_video_is_rejected() {
    let app = app();

    let response = app
        .router
        .oneshot(upload_request(&[("title", None, b"no file")]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(response).await["detail"], "No video file provided");
}

#[tokio::test]
async fn upload_with_unknown_mode_is_rejected() {
    let app = app();

    let response = app
        .router
        .oneshot(upload_request(&[
            ("video", Some("clip.mp4"), b"bytes"),
            ("mode", None, b"turbo"),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let app = app();

    let response = app.router.clone().oneshot(get("/job/does-not-exist")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(response).await["detail"], "Job not found");

    let response = app.router.oneshot(post("/job/does-not-exist/cancel")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remote_url_to_internal_host_is_rejected() {
    let app = app();

    let response = app
        .router
        .oneshot(form_request(
            "/analyze-youtube",
            "url=http%3A%2F%2F169.254.169.254%2Flatest%2Fmeta-data%2F",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.state.jobs.registry().len().await, 0);
}

#[tokio::test]
async fn remote_url_from_unlisted_domain_is_rejected() {
    let app = app();

    let response = app
        .router
        .oneshot(form_request("/analyze-youtube", "url=https%3A%2F%2Fexample.com%2Fv.mp4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let detail = json(response).await["detail"].as_str().unwrap().to_string();
    assert!(detail.contains("example.com"), "{}", detail);
}

#[tokio::test]
async fn remote_job_completes() {
    let app = app();

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/analyze-youtube",
            "url=https%3A%2F%2Fwww.youtube.com%2Fwatch%3Fv%3Dabc&mode=standard",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job_id = json(response).await["job_id"].as_str().unwrap().to_string();

    app.state.jobs.wait_terminal(&JobId::from_string(&job_id)).await.unwrap();

    let body = json(app.router.oneshot(get(&format!("/job/{}", job_id))).await.unwrap()).await;
    assert_eq!(body["status"], "done");
    assert_eq!(body["result"]["mode"], "standard");
}

#[tokio::test]
async fn cancel_stops_a_hanging_download_and_then_conflicts() {
    let app = app_with(ApiConfig::default(), true);

    let response = app
        .router
        .clone()
        .oneshot(form_request(
            "/analyze-youtube",
            "url=https%3A%2F%2Fyoutu.be%2Fabc",
        ))
        .await
        .unwrap();
    let job_id = json(response).await["job_id"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(post(&format!("/job/{}/cancel", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(json(response).await["cancel_requested"], true);

    app.state.jobs.wait_terminal(&JobId::from_string(&job_id)).await.unwrap();

    let body = json(app.router.clone().oneshot(get(&format!("/job/{}", job_id))).await.unwrap()).await;
    assert_eq!(body, serde_json::json!({ "status": "error", "error": "Job cancelled" }));

    let response = app
        .router
        .oneshot(post(&format!("/job/{}/cancel", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert!(common_entries(app.work_dir.path()).is_empty());
}

#[tokio::test]
async fn submissions_are_rate_limited_per_client() {
    let app = app_with(
        ApiConfig {
            rate_limit_rps: 1,
            ..ApiConfig::default()
        },
        false,
    );

    let request = || {
        let mut req = form_request("/analyze-youtube", "url=ftp%3A%2F%2Fnope");
        req.headers_mut()
            .insert("x-forwarded-for", "198.51.100.20".parse().unwrap());
        req
    };

    let first = app.router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let second = app.router.clone().oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers()["retry-after"], "1");

    // Polling is never limited
    let poll = app.router.oneshot(get("/job/anything")).await.unwrap();
    assert_eq!(poll.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_route_is_absent_without_recorder() {
    let app = app();

    let response = app.router.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn common_entries(dir: &std::path::Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|rd| rd.map(|e| e.unwrap().file_name().to_string_lossy().to_string()).collect())
        .unwrap_or_default()
}
