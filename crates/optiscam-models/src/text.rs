//! On-screen text detections and the per-timestamp text timeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::TimeKey;

/// Polygon around a detected text region, in source-frame pixels.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingRegion {
    pub points: Vec<[f64; 2]>,
}

impl BoundingRegion {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }
}

/// Which recognition tier produced the reported text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Fast tier only
    #[default]
    Primary,
    /// Fast tier located the region, the slower tier supplied the text
    PrimaryWithFallback,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Primary => "primary",
            DetectionMethod::PrimaryWithFallback => "primary_with_fallback",
        }
    }
}

/// A single recognized text span on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    /// Timestamp of the frame the text was read from
    pub timestamp: f64,
    pub text: String,
    /// Primary-tier confidence in [0, 1]; never rewritten by the fallback tier
    pub confidence: f64,
    pub method: DetectionMethod,
    pub region: BoundingRegion,
}

/// One timestamp's worth of detections in serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineBucket {
    pub timestamp: f64,
    pub detections: Vec<TextDetection>,
}

/// Text detections grouped by originating frame timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<TimelineBucket>", from = "Vec<TimelineBucket>")]
pub struct TextTimeline {
    buckets: BTreeMap<TimeKey, Vec<TextDetection>>,
}

impl TextTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a detection under its own timestamp.
    pub fn insert(&mut self, detection: TextDetection) {
        self.buckets
            .entry(TimeKey::new(detection.timestamp))
            .or_default()
            .push(detection);
    }

    /// Detections at exactly `timestamp`, in insertion order.
    pub fn at(&self, timestamp: f64) -> &[TextDetection] {
        self.buckets
            .get(&TimeKey::new(timestamp))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Detections at `timestamp` ordered by confidence, highest first.
    pub fn ranked_at(&self, timestamp: f64) -> Vec<&TextDetection> {
        let mut ranked: Vec<_> = self.at(timestamp).iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        ranked
    }

    /// Text at `timestamp` joined with `" | "`.
    ///
    /// With `dedupe`, exact repeats are collapsed keeping first occurrence.
    /// Returns `None` when nothing was detected.
    pub fn joined_text_at(&self, timestamp: f64, dedupe: bool) -> Option<String> {
        let texts = collect_texts(self.at(timestamp).iter(), dedupe);
        (!texts.is_empty()).then(|| texts.join(" | "))
    }

    /// All on-screen text across the video, timestamp order.
    pub fn combined_text(&self, dedupe: bool) -> String {
        collect_texts(self.buckets.values().flatten(), dedupe).join(" | ")
    }

    /// Every detection ordered by timestamp, then confidence descending.
    pub fn ordered_detections(&self) -> Vec<TextDetection> {
        self.buckets
            .keys()
            .flat_map(|k| self.ranked_at(k.seconds()).into_iter().cloned())
            .collect()
    }

    pub fn timestamps(&self) -> impl Iterator<Item = f64> + '_ {
        self.buckets.keys().map(TimeKey::seconds)
    }

    /// Total number of detections.
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

fn collect_texts<'a>(detections: impl Iterator<Item = &'a TextDetection>, dedupe: bool) -> Vec<&'a str> {
    let mut texts: Vec<&str> = Vec::new();
    for d in detections {
        let text = d.text.trim();
        if text.is_empty() || (dedupe && texts.contains(&text)) {
            continue;
        }
        texts.push(text);
    }
    texts
}

impl From<TextTimeline> for Vec<TimelineBucket> {
    fn from(timeline: TextTimeline) -> Self {
        timeline
            .buckets
            .into_iter()
            .map(|(k, detections)| TimelineBucket {
                timestamp: k.seconds(),
                detections,
            })
            .collect()
    }
}

impl From<Vec<TimelineBucket>> for TextTimeline {
    fn from(buckets: Vec<TimelineBucket>) -> Self {
        let mut timeline = TextTimeline::new();
        for bucket in buckets {
            let entry = timeline.buckets.entry(TimeKey::new(bucket.timestamp)).or_default();
            entry.extend(bucket.detections);
        }
        timeline
    }
}

impl FromIterator<TextDetection> for TextTimeline {
    fn from_iter<I: IntoIterator<Item = TextDetection>>(iter: I) -> Self {
        let mut timeline = TextTimeline::new();
        for d in iter {
            timeline.insert(d);
        }
        timeline
    }
}
