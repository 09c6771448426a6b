//! Speech transcription output.

use serde::{Deserialize, Serialize};

/// A transcribed span of audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (never before `start`)
    pub end: f64,
    /// Transcribed text
    pub text: String,
    /// Detected or requested language tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AudioSegment {
    /// Create a segment; reversed bounds are swapped so `start <= end` holds.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        Self {
            start,
            end,
            text: text.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Closed-interval containment.
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Full transcript of a video's audio track.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Concatenated transcript text
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Segments in chronological order
    pub segments: Vec<AudioSegment>,
}

impl Transcript {
    /// Build a transcript, ordering segments by start time.
    pub fn new(text: impl Into<String>, language: Option<String>, mut segments: Vec<AudioSegment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            text: text.into(),
            language,
            segments,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.segments.is_empty()
    }

    /// `[start - end] text` lines, one per segment.
    pub fn to_timed_lines(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("[{:.2}s - {:.2}s] {}", s.start, s.end, s.text.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_bounds_normalized() {
        let seg = AudioSegment::new(5.0, 2.0, "hi");
        assert_eq!((seg.start, seg.end), (2.0, 5.0));
        assert!(seg.contains(2.0));
        assert!(seg.contains(5.0));
        assert!(!seg.contains(5.01));
    }

    #[test]
    fn test_transcript_orders_segments() {
        let t = Transcript::new(
            "b a",
            Some("en".into()),
            vec![AudioSegment::new(3.0, 4.0, "b"), AudioSegment::new(0.0, 2.5, "a")],
        );
        assert_eq!(t.segments[0].text, "a");
        assert_eq!(t.to_timed_lines(), "[0.00s - 2.50s] a\n[3.00s - 4.00s] b");
    }
}
