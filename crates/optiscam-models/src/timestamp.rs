//! Timestamp helpers shared by the sampler, fuser and reports.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A frame timestamp (seconds) usable as an ordered map key.
///
/// Equality is bit-exact: two keys match only when they came from the same
/// `index / fps` computation. Ordering follows `f64::total_cmp`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeKey(f64);

impl TimeKey {
    pub fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(&self) -> f64 {
        self.0
    }
}

impl From<f64> for TimeKey {
    fn from(seconds: f64) -> Self {
        Self(seconds)
    }
}

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for TimeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Timestamp of a decoded frame; zero when the frame rate is unknown.
pub fn frame_timestamp(index: u64, fps: f64) -> f64 {
    if fps > 0.0 {
        index as f64 / fps
    } else {
        0.0
    }
}

/// Format seconds into HH:MM:SS or HH:MM:SS.mmm string.
pub fn format_seconds(total_secs: f64) -> String {
    let total_secs = total_secs.max(0.0);
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    // Include milliseconds if present
    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_frame_timestamp() {
        assert_eq!(frame_timestamp(30, 30.0), 1.0);
        assert_eq!(frame_timestamp(0, 25.0), 0.0);
        assert_eq!(frame_timestamp(90, 0.0), 0.0);
    }

    #[test]
    fn test_time_key_exact_match() {
        let fps = 29.97;
        let a = TimeKey::new(frame_timestamp(60, fps));
        let b = TimeKey::new(frame_timestamp(60, fps));
        assert_eq!(a, b);
        assert_ne!(a, TimeKey::new(a.seconds() + f64::EPSILON * 4.0));
    }

    #[test]
    fn test_time_key_ordering() {
        let mut map = BTreeMap::new();
        map.insert(TimeKey::new(2.0), "b");
        map.insert(TimeKey::new(0.5), "a");
        map.insert(TimeKey::new(10.0), "c");
        let values: Vec<_> = map.values().copied().collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00");
        assert_eq!(format_seconds(90.0), "00:01:30");
        assert_eq!(format_seconds(3661.5), "01:01:01.500");
    }
}
