//! Narrow interfaces to the external recognition models.

use async_trait::async_trait;
use optiscam_models::{BoundingRegion, Transcript};
use std::path::{Path, PathBuf};

use crate::error::MlResult;
use crate::types::{ClassifierOutput, RecognizedLine};

/// Two-tier optical character recognition.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Fast tier: locate and read every text line in an image.
    async fn detect(&self, image: &Path) -> MlResult<Vec<RecognizedLine>>;

    /// Slow tier: re-read a single region of an image.
    async fn refine(&self, image: &Path, region: &BoundingRegion) -> MlResult<String>;
}

/// Speech-to-text over an extracted audio file.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> MlResult<Transcript>;
}

/// Vision-language model used for the verdict and per-frame notes.
#[async_trait]
pub trait VisionLanguageModel: Send + Sync {
    /// Answer `prompt` over an ordered set of frames.
    async fn classify(&self, images: &[PathBuf], prompt: &str) -> MlResult<ClassifierOutput>;

    /// Free-text description of a single frame.
    async fn describe(&self, image: &Path, prompt: &str) -> MlResult<String>;
}
