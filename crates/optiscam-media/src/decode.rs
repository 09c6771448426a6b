//! Frame decoding and audio extraction behind a backend trait.
//!
//! The FFmpeg backend pipes packed RGB24 frames from stdout and reads exactly
//! one frame at a time, so memory use stays at a single frame buffer.

use async_trait::async_trait;
use image::RgbImage;
use optiscam_models::frame_timestamp;
use std::path::Path;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cancel::CancelSignal;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::metadata::inspect_video;

/// One decoded video frame.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Index in the full decoded stream
    pub index: u64,
    /// Seconds from start (`index / fps`, 0 when fps is unknown)
    pub timestamp: f64,
    pub image: RgbImage,
}

/// Decoder hints. Sources may ignore them; callers still filter by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeHints {
    /// Only frames whose index is a multiple of this are needed
    pub stride: u64,
}

impl Default for DecodeHints {
    fn default() -> Self {
        Self { stride: 1 }
    }
}

/// A sequential stream of decoded frames.
///
/// `Err` values for which [`MediaError::is_frame_local`] holds affect only
/// that frame; the stream may be polled again.
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>>;
}

/// Codec-level operations the pipeline needs.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Open a video for sequential frame decoding.
    async fn open_frames(&self, video: &Path, hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>>;

    /// Write the audio track of `video` to `output` as 16 kHz mono WAV.
    ///
    /// Returns [`MediaError::Cancelled`] once `cancel` fires; nothing writes
    /// to `output` after that.
    async fn extract_audio(&self, video: &Path, output: &Path, cancel: CancelSignal) -> MediaResult<()>;
}

/// [`MediaBackend`] that shells out to ffprobe/ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    timeout_secs: Option<u64>,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout applied to audio extraction.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    async fn open_frames(&self, video: &Path, hints: DecodeHints) -> MediaResult<Box<dyn FrameSource>> {
        let info = inspect_video(video).await?;
        let stride = hints.stride.max(1);
        let (width, height) = info.display_dimensions();

        let mut cmd = FfmpegCommand::to_stdout(video);
        if stride > 1 {
            cmd = cmd.video_filter(format!("select='not(mod(n\\,{}))'", stride));
        }
        let mut child = cmd.passthrough_timing().raw_rgb24().spawn_piped()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("Failed to capture FFmpeg stdout", None, None))?;
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        debug!(
            video = %video.display(),
            width,
            height,
            rotation = info.rotation,
            fps = info.fps,
            stride,
            "Opened raw frame stream"
        );

        Ok(Box::new(FfmpegFrameSource {
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            width,
            height,
            frame_len: info.rgb24_frame_len(),
            fps: info.fps,
            stride,
            emitted: 0,
            finished: false,
        }))
    }

    async fn extract_audio(&self, video: &Path, output: &Path, cancel: CancelSignal) -> MediaResult<()> {
        let info = inspect_video(video).await?;
        if !info.has_audio {
            return Err(MediaError::NoAudio(video.to_path_buf()));
        }

        let mut runner = FfmpegRunner::new().with_cancel(cancel);
        if let Some(secs) = self.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        runner
            .run(&FfmpegCommand::new(video, output).mono_wav_16k())
            .await
    }
}

struct FfmpegFrameSource {
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    width: u32,
    height: u32,
    frame_len: usize,
    fps: f64,
    stride: u64,
    emitted: u64,
    finished: bool,
}

impl FfmpegFrameSource {
    async fn finish(&mut self) -> MediaResult<Option<DecodedFrame>> {
        self.finished = true;
        let status = self.child.wait().await?;
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() && self.emitted == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "could not decode any frame: {}",
                stderr.lines().last().unwrap_or("ffmpeg exited with an error")
            )));
        }
        if !status.success() {
            warn!(
                exit_code = ?status.code(),
                frames = self.emitted,
                "FFmpeg exited with an error after partial decode"
            );
        }
        Ok(None)
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<DecodedFrame>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        match self.stdout.read_exact(&mut buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return self.finish().await,
            Err(e) => return Err(e.into()),
        }

        let index = self.emitted * self.stride;
        self.emitted += 1;

        let image = RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| MediaError::corrupt_frame(index, "buffer does not match frame size"))?;

        Ok(Some(DecodedFrame {
            index,
            timestamp: frame_timestamp(index, self.fps),
            image,
        }))
    }
}
