//! Prometheus metrics for the API server.
//!
//! The recorder installed here also collects the job and stage metrics
//! emitted by the worker crate.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "optiscam_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "optiscam_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "optiscam_http_requests_in_flight";
    pub const RATE_LIMIT_HITS_TOTAL: &str = "optiscam_rate_limit_hits_total";
    pub const URL_REJECTED_TOTAL: &str = "optiscam_url_rejected_total";
}

static JOB_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/job/[^/]+").expect("valid job path pattern"));

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Record a remote URL refused by validation.
pub fn record_url_rejected() {
    counter!(names::URL_REJECTED_TOTAL).increment(1);
}

/// Collapse job ids so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    JOB_PATH.replace(path, "/job/:job_id").to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
    let response = next.run(request).await;
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());

    response
}
