//! In-process fakes of the external collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use optiscam_media::{
    cancelled, CancelSignal, DecodeHints, DecodedFrame, FrameSource, MediaBackend, MediaError, MediaResult,
    VideoFetcher,
};
use optiscam_ml_client::{
    ClassifierOutput, MlError, MlResult, RecognizedLine, SpeechRecognizer, TextRecognizer, TokenLogits,
    VisionLanguageModel,
};
use optiscam_models::{frame_timestamp, AudioSegment, BoundingRegion, Transcript};
use optiscam_worker::{Collaborators, JobManager, WorkerConfig};

pub fn sharp_image() -> RgbImage {
    RgbImage::from_fn(48, 48, |x, y| {
        let v = if (x + y) % 2 == 0 { 255 } else { 0 };
        Rgb([v, v, v])
    })
}

pub fn blurred_image() -> RgbImage {
    RgbImage::from_pixel(48, 48, Rgb([120, 120, 120]))
}

/// Synthetic 1 fps video; `sharp` lists the indices that are in focus.
pub struct SyntheticVideo {
    pub frame_count: u64,
    pub fps: f64,
    pub sharp: Vec<u64>,
    pub has_audio: bool,
}

impl SyntheticVideo {
    /// Ten seconds, one sharp frame at index 4.
    pub fn one_sharp_of_ten() -> Self {
        Self {
            frame_count: 10,
            fps: 1.0,
            sharp: vec![4],
            has_audio: true,
        }
    }
}

struct SyntheticSource {
    frames: VecDeque<DecodedFrame>,
}

#[async_trait]
impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>> {
        Ok(self.frames.pop_front())
    }
}

#[async_trait]
impl MediaBackend for SyntheticVideo {
    async fn open_frames(&self, video: &Path, _hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>> {
        if !video.is_file() {
            return Err(MediaError::FileNotFound(video.to_path_buf()));
        }
        let frames = (0..self.frame_count)
            .map(|index| DecodedFrame {
                index,
                timestamp: frame_timestamp(index, self.fps),
                image: if self.sharp.contains(&index) {
                    sharp_image()
                } else {
                    blurred_image()
                },
            })
            .collect();
        Ok(Box::new(SyntheticSource { frames }))
    }

    async fn extract_audio(&self, video: &Path, output: &Path, _cancel: CancelSignal) -> MediaResult<()> {
        if !self.has_audio {
            return Err(MediaError::NoAudio(video.to_path_buf()));
        }
        tokio::fs::write(output, b"RIFF").await?;
        Ok(())
    }
}

/// OCR fake: one line per frame, or failure on every frame.
pub struct FakeOcr {
    pub fail_all: bool,
    pub confidence: f64,
}

impl Default for FakeOcr {
    fn default() -> Self {
        Self {
            fail_all: false,
            confidence: 0.92,
        }
    }
}

#[async_trait]
impl TextRecognizer for FakeOcr {
    async fn detect(&self, image: &Path) -> MlResult<Vec<RecognizedLine>> {
        if self.fail_all {
            return Err(MlError::ServiceUnavailable("ocr down".into()));
        }
        assert!(image.is_file(), "frame artifact must exist while text is extracted");
        Ok(vec![RecognizedLine {
            region: BoundingRegion::new(vec![[2.0, 2.0], [40.0, 2.0], [40.0, 10.0], [2.0, 10.0]]),
            text: "GUARANTEED 10X RETURNS".into(),
            confidence: self.confidence,
        }])
    }

    async fn refine(&self, _image: &Path, _region: &BoundingRegion) -> MlResult<String> {
        Ok("GUARANTEED 10X RETURNS!".into())
    }
}

/// Speech fake with two back-to-back segments.
pub struct FakeAsr {
    pub fail: bool,
}

#[async_trait]
impl SpeechRecognizer for FakeAsr {
    async fn transcribe(&self, audio: &Path, _language: Option<&str>) -> MlResult<Transcript> {
        if self.fail {
            return Err(MlError::Timeout(300));
        }
        assert!(audio.is_file());
        Ok(Transcript::new(
            "Invest today. Double your money.",
            Some("en".into()),
            vec![
                AudioSegment::new(0.0, 4.0, "Invest today."),
                AudioSegment::new(4.0, 10.0, "Double your money."),
            ],
        ))
    }
}

/// Classifier fake that records what it was asked.
pub struct FakeVlm {
    pub answer: String,
    pub logits: Option<TokenLogits>,
    pub prompts: Mutex<Vec<String>>,
    pub frames_seen: Mutex<Vec<PathBuf>>,
}

impl FakeVlm {
    pub fn answering(answer: &str, logits: Option<TokenLogits>) -> Self {
        Self {
            answer: answer.to_string(),
            logits,
            prompts: Mutex::new(Vec::new()),
            frames_seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl VisionLanguageModel for FakeVlm {
    async fn classify(&self, images: &[PathBuf], prompt: &str) -> MlResult<ClassifierOutput> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        *self.frames_seen.lock().unwrap() = images.to_vec();
        Ok(ClassifierOutput {
            text: self.answer.clone(),
            first_token_logits: self.logits,
        })
    }

    async fn describe(&self, _image: &Path, _prompt: &str) -> MlResult<String> {
        Ok("Fake investment banner".into())
    }
}

/// How the fake fetcher behaves.
pub enum FetchBehavior {
    /// Write a small finished file.
    Succeed,
    /// Write a partial file, then fail.
    FailMidway,
    /// Write a partial file and wait for cancel. Once cancelled, finish
    /// writing the merged file before returning, like a helper process
    /// that is still flushing.
    Hang,
    /// Write a partial file, then never return, even when cancelled.
    IgnoreCancel,
}

pub struct FakeFetcher {
    pub behavior: FetchBehavior,
}

#[async_trait]
impl VideoFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _url: &str,
        staging_dir: &Path,
        file_stem: &str,
        mut cancel: CancelSignal,
    ) -> MediaResult<PathBuf> {
        let partial = staging_dir.join(format!("{}.mp4.part", file_stem));
        match self.behavior {
            FetchBehavior::Succeed => {
                let done = staging_dir.join(format!("{}.mp4", file_stem));
                tokio::fs::write(&done, b"video").await?;
                Ok(done)
            }
            FetchBehavior::FailMidway => {
                tokio::fs::write(&partial, b"half a vid").await?;
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(MediaError::download_failed("connection reset by peer"))
            }
            FetchBehavior::Hang => {
                tokio::fs::write(&partial, b"half a vid").await?;
                cancelled(&mut cancel).await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                tokio::fs::write(staging_dir.join(format!("{}.mp4", file_stem)), b"merged").await?;
                Err(MediaError::Cancelled)
            }
            FetchBehavior::IgnoreCancel => {
                tokio::fs::write(&partial, b"half a vid").await?;
                std::future::pending().await
            }
        }
    }
}

pub struct Harness {
    pub manager: JobManager,
    pub vlm: Arc<FakeVlm>,
    pub work_dir: tempfile::TempDir,
    pub report_dir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    pub video: SyntheticVideo,
    pub ocr: FakeOcr,
    pub asr_fails: bool,
    pub vlm: FakeVlm,
    pub fetch: FetchBehavior,
    pub configure: Box<dyn FnOnce(&mut WorkerConfig)>,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            video: SyntheticVideo::one_sharp_of_ten(),
            ocr: FakeOcr::default(),
            asr_fails: false,
            vlm: FakeVlm::answering(
                "Yes. The video promises guaranteed returns.",
                Some(TokenLogits { yes: 2.0, no: 0.0 }),
            ),
            fetch: FetchBehavior::Succeed,
            configure: Box::new(|_| {}),
        }
    }
}

impl HarnessBuilder {
    pub fn build(self) -> Harness {
        let work_dir = tempfile::TempDir::new().unwrap();
        let report_dir = tempfile::TempDir::new().unwrap();

        let mut config = WorkerConfig {
            work_dir: work_dir.path().to_path_buf(),
            report_dir: Some(report_dir.path().to_path_buf()),
            ..WorkerConfig::default()
        };
        config.pipeline.frame_interval = 1;
        config.pipeline.holistic_frame_interval = 1;
        config.pipeline.sharpness_threshold = 100.0;
        (self.configure)(&mut config);

        let vlm = Arc::new(self.vlm);
        let manager = JobManager::new(
            Collaborators {
                media: Arc::new(self.video),
                text: Arc::new(self.ocr),
                speech: Arc::new(FakeAsr { fail: self.asr_fails }),
                vlm: vlm.clone(),
            },
            Arc::new(FakeFetcher { behavior: self.fetch }),
            config,
        );

        Harness {
            manager,
            vlm,
            work_dir,
            report_dir,
        }
    }
}

/// Entries left in a directory.
pub fn entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.map(|e| e.unwrap().file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default()
}
