//! Media handling for video analysis.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with cancellation support
//! - Process-group ownership for tools that spawn helpers
//! - FFprobe stream inspection
//! - Raw frame decoding behind the [`MediaBackend`] trait
//! - Sharpness scoring, CLAHE enhancement and quality-filtered frame sampling
//! - Remote video fetching via yt-dlp
//! - Per-job artifact sweeping

pub mod cancel;
pub mod command;
pub mod decode;
pub mod download;
pub mod enhance;
pub mod error;
pub mod fs_utils;
pub mod metadata;
pub mod process;
pub mod sampler;
pub mod sharpness;
pub mod subsample;

pub use cancel::{cancelled, is_cancelled, never_cancelled, CancelSignal};
pub use command::{check_ffmpeg, check_ffprobe, check_ytdlp, FfmpegCommand, FfmpegRunner};
pub use decode::{DecodeHints, DecodedFrame, FfmpegBackend, FrameSource, MediaBackend};
pub use download::{VideoFetcher, YtDlpFetcher};
pub use enhance::{clahe_luma, ClaheConfig};
pub use error::{MediaError, MediaResult};
pub use fs_utils::sweep_prefix;
pub use metadata::{inspect_video, VideoInfo};
pub use sampler::{FrameSampler, SamplerConfig};
pub use sharpness::{laplacian_variance, luma};
pub use subsample::{even_subsample, even_subsample_indices};
