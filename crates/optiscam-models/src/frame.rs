//! Sampled frame records.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A frame retained by the sampler.
///
/// The record points at one enhanced JPEG artifact on disk. The artifact is
/// owned by the job that produced it and removed by the job's cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Index of the frame in the decoded stream
    pub index: u64,
    /// Seconds from the start of the video
    pub timestamp: f64,
    /// Variance-of-Laplacian focus score
    pub sharpness: f64,
    /// Stored enhanced image
    pub image_path: PathBuf,
}

impl FrameRecord {
    pub fn new(index: u64, timestamp: f64, sharpness: f64, image_path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            timestamp,
            sharpness,
            image_path: image_path.into(),
        }
    }

    /// Canonical artifact file name for a frame index.
    pub fn artifact_name(index: u64) -> String {
        format!("frame_{:04}.jpg", index)
    }
}
