//! Router harness with in-process collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use axum::Router;
use image::{Rgb, RgbImage};
use optiscam_api::{create_router, ApiConfig, AppState};
use optiscam_media::{
    cancelled, CancelSignal, DecodeHints, DecodedFrame, FrameSource, MediaBackend, MediaError, MediaResult,
    VideoFetcher,
};
use optiscam_ml_client::{
    ClassifierOutput, MlClient, MlClientConfig, MlResult, RecognizedLine, SpeechRecognizer, TextRecognizer,
    TokenLogits, VisionLanguageModel,
};
use optiscam_models::{frame_timestamp, AudioSegment, BoundingRegion, Transcript};
use optiscam_worker::{Collaborators, JobManager, WorkerConfig};

/// Three checkerboard frames at 1 fps.
struct ThreeFrames;

struct QueuedFrames(VecDeque<DecodedFrame>);

#[async_trait]
impl FrameSource for QueuedFrames {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>> {
        Ok(self.0.pop_front())
    }
}

#[async_trait]
impl MediaBackend for ThreeFrames {
    async fn open_frames(&self, video: &Path, _hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>> {
        if !video.is_file() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        let frames = (0..3)
            .map(|index| DecodedFrame {
                index,
                timestamp: frame_timestamp(index, 1.0),
                image: RgbImage::from_fn(32, 32, |x, y| {
                    let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                    Rgb([v, v, v])
                }),
            })
            .collect();
        Ok(Box::new(QueuedFrames(frames)))
    }

    async fn extract_audio(&self, _video: &Path, output: &Path, _cancel: CancelSignal) -> MediaResult<()> {
        tokio::fs::write(output, b"RIFF").await?;
        Ok(())
    }
}

struct Models;

#[async_trait]
impl TextRecognizer for Models {
    async fn detect(&self, _image: &Path) -> MlResult<Vec<RecognizedLine>> {
        Ok(vec![RecognizedLine {
            region: BoundingRegion::default(),
            text: "SEND 1 BTC GET 2 BACK".into(),
            confidence: 0.9,
        }])
    }

    async fn refine(&self, _image: &Path, _region: &BoundingRegion) -> MlResult<String> {
        Ok(String::new())
    }
}

#[async_trait]
impl SpeechRecognizer for Models {
    async fn transcribe(&self, _audio: &Path, _language: Option<&str>) -> MlResult<Transcript> {
        Ok(Transcript::new(
            "Act now.",
            Some("en".into()),
            vec![AudioSegment::new(0.0, 3.0, "Act now.")],
        ))
    }
}

#[async_trait]
impl VisionLanguageModel for Models {
    async fn classify(&self, _images: &[PathBuf], _prompt: &str) -> MlResult<ClassifierOutput> {
        Ok(ClassifierOutput {
            text: "Yes, this is a giveaway scam.".into(),
            first_token_logits: Some(TokenLogits { yes: 1.0, no: 1.0 }),
        })
    }

    async fn describe(&self, _image: &Path, _prompt: &str) -> MlResult<String> {
        Ok("Crypto giveaway banner".into())
    }
}

/// Fetcher that either succeeds at once or runs until cancelled.
pub struct Fetcher {
    pub hang: bool,
}

#[async_trait]
impl VideoFetcher for Fetcher {
    async fn fetch(
        &self,
        _url: &str,
        staging_dir: &Path,
        file_stem: &str,
        mut cancel: CancelSignal,
    ) -> MediaResult<PathBuf> {
        if self.hang {
            tokio::fs::write(staging_dir.join(format!("{}.mp4.part", file_stem)), b"part").await?;
            cancelled(&mut cancel).await;
            return Err(MediaError::Cancelled);
        }
        let path = staging_dir.join(format!("{}.mp4", file_stem));
        tokio::fs::write(&path, b"video").await?;
        Ok(path)
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub work_dir: tempfile::TempDir,
}

pub fn app() -> TestApp {
    app_with(ApiConfig::default(), false)
}

pub fn app_with(config: ApiConfig, hanging_fetch: bool) -> TestApp {
    let work_dir = tempfile::TempDir::new().unwrap();
    let mut worker = WorkerConfig {
        work_dir: work_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    };
    worker.pipeline.frame_interval = 1;
    worker.pipeline.use_sharpness_filter = false;

    let models = Arc::new(Models);
    let jobs = JobManager::new(
        Collaborators {
            media: Arc::new(ThreeFrames),
            text: models.clone(),
            speech: models.clone(),
            vlm: models,
        },
        Arc::new(Fetcher { hang: hanging_fetch }),
        worker,
    );

    // Nothing listens on the discard port, so the sidecar reads as down
    let ml = MlClient::new(MlClientConfig {
        base_url: "http://127.0.0.1:9".into(),
        timeout: Duration::from_secs(2),
        max_retries: 0,
        retry_backoff: Duration::from_millis(1),
    })
    .unwrap();

    let state = AppState::new(config, jobs, Arc::new(ml));
    TestApp {
        router: create_router(state.clone(), None),
        state,
        work_dir,
    }
}

pub const BOUNDARY: &str = "optiscam-test-boundary";

/// Build a multipart body from (name, filename, value) parts.
pub fn multipart(parts: &[(&str, Option<&str>, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, filename, value) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match filename {
            Some(f) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: video/mp4\r\n\r\n",
                    name, f
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Body::from(body)
}

pub fn upload_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(multipart(parts))
        .unwrap()
}

pub fn form_request(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
}

pub async fn json(response: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
