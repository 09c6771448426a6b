//! Frame-anchored merge of text, audio and frame signals.

use optiscam_models::{AudioSegment, FrameRecord, FusedContext, TextTimeline};

/// Merges per-stage signals into one context per sampled frame.
///
/// Fusion is a pure function of its inputs; no recognition happens here.
#[derive(Debug, Clone, Copy)]
pub struct TimelineFuser {
    dedupe_text: bool,
}

impl Default for TimelineFuser {
    fn default() -> Self {
        Self { dedupe_text: true }
    }
}

impl TimelineFuser {
    pub fn new(dedupe_text: bool) -> Self {
        Self { dedupe_text }
    }

    /// One [`FusedContext`] per frame, in frame order.
    pub fn fuse(
        &self,
        frames: &[FrameRecord],
        timeline: &TextTimeline,
        segments: &[AudioSegment],
    ) -> Vec<FusedContext> {
        frames
            .iter()
            .map(|frame| FusedContext {
                timestamp: frame.timestamp,
                frame_index: frame.index,
                sharpness: frame.sharpness,
                text: timeline.joined_text_at(frame.timestamp, self.dedupe_text),
                audio: segment_at(segments, frame.timestamp).map(|s| s.text.clone()),
                image_path: frame.image_path.clone(),
                visual_analysis: None,
            })
            .collect()
    }
}

/// Segment whose closed interval contains `t`.
///
/// Shared boundaries resolve to the segment with the smaller start; among
/// equal starts the earlier one in the input wins.
pub fn segment_at(segments: &[AudioSegment], t: f64) -> Option<&AudioSegment> {
    segments
        .iter()
        .filter(|s| s.contains(t))
        .min_by(|a, b| a.start.total_cmp(&b.start))
}
