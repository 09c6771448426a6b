//! Shared data models for the OptiScam analysis backend.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis jobs and their status state machine
//! - Sampled frames and timestamped text/audio signals
//! - Fused per-moment contexts and the final analysis result

pub mod analysis;
pub mod audio;
pub mod frame;
pub mod job;
pub mod job_status;
pub mod text;
pub mod timestamp;

// Re-export common types
pub use analysis::{AnalysisMode, AnalysisOptions, AnalysisResult, FusedContext, Verdict};
pub use audio::{AudioSegment, Transcript};
pub use frame::FrameRecord;
pub use job::{Job, JobId, JobSource, TransitionError};
pub use job_status::JobStatus;
pub use text::{BoundingRegion, DetectionMethod, TextDetection, TextTimeline, TimelineBucket};
pub use timestamp::{format_seconds, frame_timestamp, TimeKey};
