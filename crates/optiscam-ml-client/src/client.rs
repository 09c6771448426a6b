//! Model sidecar HTTP client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use optiscam_models::{BoundingRegion, Transcript};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::recognizer::{SpeechRecognizer, TextRecognizer, VisionLanguageModel};
use crate::types::{
    ClassifierOutput, ClassifyRequest, DescribeRequest, HealthResponse, OcrDetectRequest,
    OcrDetectResponse, OcrRefineRequest, RecognizedLine, TextResponse, TranscribeRequest,
    TranscribeResponse,
};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// First retry delay; doubles on each attempt
    pub retry_backoff: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(300), // 5 minutes for transcription
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_retries: std::env::var("ML_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_backoff: defaults.retry_backoff,
        }
    }
}

/// Client for the model sidecar.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    /// Create a new ML client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if the sidecar is up and its models are loaded.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                let status_ok = health.status == "healthy" || health.status == "ok";
                Ok(status_ok && health.models_loaded.unwrap_or(true))
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// POST a JSON body and decode a JSON response, with retries.
    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending request to {}", url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            MlError::Timeout(self.config.timeout.as_secs())
                        } else {
                            MlError::Network(e)
                        }
                    })?;

                match response.status() {
                    s if s.is_success() => Ok(response),
                    StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                        Err(MlError::ServiceUnavailable(format!("{} returned {}", path, response.status())))
                    }
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        Err(MlError::RequestFailed(format!(
                            "ML service returned {}: {}",
                            status, body
                        )))
                    }
                }
            })
            .await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| MlError::InvalidResponse(format!("{}: {}", path, e)))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = retry_delay(self.config.retry_backoff, attempt);
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

/// Upper bound on a single backoff sleep.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Exponential backoff that saturates instead of overflowing.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
        .min(MAX_RETRY_DELAY)
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap_or_default()
}

#[async_trait]
impl TextRecognizer for MlClient {
    async fn detect(&self, image: &Path) -> MlResult<Vec<RecognizedLine>> {
        let response: OcrDetectResponse = self
            .post_json(
                "/ocr/detect",
                &OcrDetectRequest {
                    image_path: path_str(image),
                },
            )
            .await?;
        Ok(response.lines)
    }

    async fn refine(&self, image: &Path, region: &BoundingRegion) -> MlResult<String> {
        let response: TextResponse = self
            .post_json(
                "/ocr/refine",
                &OcrRefineRequest {
                    image_path: path_str(image),
                    region,
                },
            )
            .await?;
        Ok(response.text)
    }
}

#[async_trait]
impl SpeechRecognizer for MlClient {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> MlResult<Transcript> {
        let response: TranscribeResponse = self
            .post_json(
                "/asr/transcribe",
                &TranscribeRequest {
                    audio_path: path_str(audio),
                    language,
                },
            )
            .await?;

        let language = response.language.or_else(|| language.map(str::to_string));
        let segments = response
            .segments
            .into_iter()
            .map(|s| s.into_segment(language.as_deref()))
            .collect();
        Ok(Transcript::new(response.text.trim(), language, segments))
    }
}

#[async_trait]
impl VisionLanguageModel for MlClient {
    async fn classify(&self, images: &[PathBuf], prompt: &str) -> MlResult<ClassifierOutput> {
        if images.is_empty() {
            return Err(MlError::RequestFailed("no frames to classify".to_string()));
        }
        self.post_json(
            "/vlm/classify",
            &ClassifyRequest {
                image_paths: images.iter().map(|p| path_str(p)).collect(),
                prompt,
            },
        )
        .await
    }

    async fn describe(&self, image: &Path, prompt: &str) -> MlResult<String> {
        let response: TextResponse = self
            .post_json(
                "/vlm/describe",
                &DescribeRequest {
                    image_path: path_str(image),
                    prompt,
                },
            )
            .await?;
        Ok(response.text)
    }
}
