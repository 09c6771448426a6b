//! Quality-filtered frame sampling.
//!
//! Every `interval`-th decoded frame is scored for sharpness. Frames under
//! the threshold are dropped when filtering is on; survivors are enhanced
//! with CLAHE and written as `frame_{index:04}.jpg` into the output
//! directory. The caller owns that directory and removes it with the job.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use optiscam_models::FrameRecord;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cancel::{is_cancelled, CancelSignal};
use crate::decode::{DecodeHints, DecodedFrame, MediaBackend};
use crate::enhance::{clahe_luma, ClaheConfig};
use crate::error::{MediaError, MediaResult};
use crate::sharpness::{laplacian_variance, luma};
use crate::subsample::even_subsample_indices;

/// Sampler settings.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Take every Nth decoded frame
    pub interval: u64,
    /// Minimum sharpness to keep a frame when filtering
    pub sharpness_threshold: f64,
    pub use_sharpness_filter: bool,
    /// Frame budget; larger outputs are evenly subsampled
    pub max_frames: Option<usize>,
    /// Give up after this many corrupt frames in a row
    pub max_consecutive_corrupt: usize,
    pub clahe: ClaheConfig,
    pub jpeg_quality: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: 30,
            sharpness_threshold: 100.0,
            use_sharpness_filter: true,
            max_frames: None,
            max_consecutive_corrupt: 25,
            clahe: ClaheConfig::default(),
            jpeg_quality: 90,
        }
    }
}

/// Extracts a sparse, quality-filtered frame sequence from a video.
#[derive(Debug, Clone, Default)]
pub struct FrameSampler {
    config: SamplerConfig,
    cancel: Option<CancelSignal>,
}

impl FrameSampler {
    pub fn new(config: SamplerConfig) -> Self {
        Self { config, cancel: None }
    }

    /// Stop between frames once `cancel` fires. The frame being encoded
    /// finishes first, so no write outlives [`FrameSampler::sample`].
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Sample `video` into `out_dir`.
    ///
    /// Fails when the video cannot be opened or yields no decodable frame.
    /// Corrupt frames are skipped. Returned timestamps are non-decreasing.
    pub async fn sample(
        &self,
        backend: &dyn MediaBackend,
        video: &Path,
        out_dir: &Path,
    ) -> MediaResult<Vec<FrameRecord>> {
        let interval = self.config.interval.max(1);
        tokio::fs::create_dir_all(out_dir).await?;

        let mut source = backend
            .open_frames(video, DecodeHints { stride: interval })
            .await?;

        let mut records: Vec<FrameRecord> = Vec::new();
        let mut decoded = 0u64;
        let mut corrupt_run = 0usize;
        let mut last_index: Option<u64> = None;

        loop {
            if self.cancel.as_ref().is_some_and(is_cancelled) {
                info!(decoded, retained = records.len(), "Frame sampling cancelled");
                return Err(MediaError::Cancelled);
            }

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if e.is_frame_local() => {
                    corrupt_run += 1;
                    warn!(error = %e, "Skipping corrupt frame");
                    if corrupt_run > self.config.max_consecutive_corrupt {
                        return Err(MediaError::InvalidVideo(format!(
                            "{} consecutive corrupt frames",
                            corrupt_run
                        )));
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };
            corrupt_run = 0;
            decoded += 1;

            if frame.index % interval != 0 {
                continue;
            }
            if last_index.is_some_and(|last| frame.index <= last) {
                warn!(index = frame.index, "Out-of-order frame ignored");
                continue;
            }
            last_index = Some(frame.index);

            if let Some(record) = self.process(frame, out_dir).await? {
                records.push(record);
            }
        }

        if decoded == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "no decodable frames in {}",
                video.display()
            )));
        }

        metrics::counter!("optiscam_frames_decoded_total").increment(decoded);

        if let Some(budget) = self.config.max_frames {
            records = apply_budget(records, budget).await;
        }

        metrics::counter!("optiscam_frames_retained_total").increment(records.len() as u64);
        info!(
            decoded,
            retained = records.len(),
            interval,
            "Frame sampling complete"
        );

        Ok(records)
    }

    /// Score one frame; persist it when it passes the filter.
    async fn process(&self, frame: DecodedFrame, out_dir: &Path) -> MediaResult<Option<FrameRecord>> {
        let config = self.config.clone();
        let path = out_dir.join(FrameRecord::artifact_name(frame.index));

        tokio::task::spawn_blocking(move || -> MediaResult<Option<FrameRecord>> {
            let sharpness = laplacian_variance(&luma(&frame.image));
            if config.use_sharpness_filter && sharpness < config.sharpness_threshold {
                debug!(index = frame.index, sharpness, "Frame below sharpness threshold");
                return Ok(None);
            }

            let enhanced = clahe_luma(&frame.image, &config.clahe);
            write_jpeg(&enhanced, &path, config.jpeg_quality)?;

            Ok(Some(FrameRecord::new(frame.index, frame.timestamp, sharpness, path)))
        })
        .await
        .map_err(|e| MediaError::internal(format!("frame task failed: {}", e)))?
    }
}

fn write_jpeg(image: &RgbImage, path: &Path, quality: u8) -> MediaResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality).encode_image(image)?;
    writer.flush()?;
    Ok(())
}

/// Keep an even spread of at most `budget` records, deleting the rest.
async fn apply_budget(records: Vec<FrameRecord>, budget: usize) -> Vec<FrameRecord> {
    if records.len() <= budget {
        return records;
    }

    let keep = even_subsample_indices(records.len(), budget);
    let mut kept = Vec::with_capacity(keep.len());
    let mut keep_iter = keep.into_iter().peekable();

    for (i, record) in records.into_iter().enumerate() {
        if keep_iter.peek() == Some(&i) {
            keep_iter.next();
            kept.push(record);
        } else if let Err(e) = tokio::fs::remove_file(&record.image_path).await {
            warn!(path = %record.image_path.display(), error = %e, "Failed to remove dropped frame");
        }
    }
    kept
}
