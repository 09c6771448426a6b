//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{MediaError, MediaResult};

/// Video file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Stored width in pixels
    pub width: u32,
    /// Stored height in pixels
    pub height: u32,
    /// Display rotation in degrees, normalized to 0, 90, 180 or 270
    pub rotation: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Whether an audio stream is present
    pub has_audio: bool,
    /// Frame count reported by the container, if any
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    /// Dimensions of decoded frames. FFmpeg applies the display rotation
    /// while decoding, so quarter turns swap width and height.
    pub fn display_dimensions(&self) -> (u32, u32) {
        match self.rotation {
            90 | 270 => (self.height, self.width),
            _ => (self.width, self.height),
        }
    }

    /// Bytes in one packed RGB24 decoded frame.
    pub fn rgb24_frame_len(&self) -> usize {
        let (width, height) = self.display_dimensions();
        width as usize * height as usize * 3
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Option<Vec<FfprobeSideData>>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix, falling back to the legacy
    /// `rotate` tag.
    fn rotation(&self) -> u32 {
        let degrees = self
            .side_data_list
            .iter()
            .flatten()
            .find_map(|sd| sd.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .unwrap_or(0.0);
        normalize_rotation(degrees)
    }
}

/// Snap to the nearest quarter turn in [0, 360).
fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

/// Read stream metadata for a video file.
pub async fn inspect_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    // Check FFprobe exists
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let report: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

    // Find video stream
    let video_stream = report
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    // Parse duration
    let duration = report
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // Parse size
    let size = report
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    // Unknown rates stay at zero so every frame timestamp falls back to 0
    let fps = video_stream
        .avg_frame_rate
        .as_ref()
        .and_then(|r| parse_frame_rate(r))
        .or_else(|| video_stream.r_frame_rate.as_ref().and_then(|r| parse_frame_rate(r)))
        .unwrap_or(0.0);

    let width = video_stream.width.unwrap_or(0);
    let height = video_stream.height.unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "Video stream has no dimensions: {}",
            path.display()
        )));
    }

    Ok(VideoInfo {
        duration,
        width,
        height,
        rotation: video_stream.rotation(),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        size,
        has_audio: report.streams.iter().any(|s| s.codec_type == "audio"),
        frame_count: video_stream.nb_frames.as_ref().and_then(|n| n.parse().ok()),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("N/A").is_none());
    }

    #[test]
    fn test_parse_ffprobe_output() {
        let json = r#"{
            "format": {"duration": "10.0", "size": "1024"},
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 64, "height": 48,
                 "r_frame_rate": "1/1", "avg_frame_rate": "1/1", "nb_frames": "10"},
                {"codec_type": "audio", "codec_name": "aac"}
            ]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.streams.len(), 2);
        assert_eq!(parsed.streams[0].nb_frames.as_deref(), Some("10"));
    }

    #[test]
    fn test_rgb24_frame_len() {
        let info = VideoInfo {
            duration: 1.0,
            width: 4,
            height: 2,
            rotation: 0,
            fps: 30.0,
            codec: "h264".into(),
            size: 0,
            has_audio: false,
            frame_count: None,
        };
        assert_eq!(info.rgb24_frame_len(), 24);
    }

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0.0), 0);
        assert_eq!(normalize_rotation(-90.0), 270);
        assert_eq!(normalize_rotation(90.0), 90);
        assert_eq!(normalize_rotation(-180.0), 180);
        assert_eq!(normalize_rotation(450.0), 90);
        assert_eq!(normalize_rotation(f64::NAN), 0);
    }

    #[test]
    fn test_rotated_stream_swaps_decoded_dimensions() {
        let json = r#"{
            "format": {"duration": "4.0"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "avg_frame_rate": "30/1",
                 "side_data_list": [{"side_data_type": "Display Matrix", "rotation": -90}]}
            ]
        }"#;
        let parsed: FfprobeOutput = serde_json::from_str(json).unwrap();
        let stream = &parsed.streams[0];
        assert_eq!(stream.rotation(), 270);

        let info = VideoInfo {
            duration: 4.0,
            width: 1920,
            height: 1080,
            rotation: stream.rotation(),
            fps: 30.0,
            codec: String::new(),
            size: 0,
            has_audio: false,
            frame_count: None,
        };
        assert_eq!(info.display_dimensions(), (1080, 1920));
        assert_eq!(info.rgb24_frame_len(), 1920 * 1080 * 3);
    }

    #[test]
    fn test_legacy_rotate_tag() {
        let json = r#"{"codec_type": "video", "width": 640, "height": 360, "tags": {"rotate": "90"}}"#;
        let stream: FfprobeStream = serde_json::from_str(json).unwrap();
        assert_eq!(stream.rotation(), 90);

        let json = r#"{"codec_type": "video", "width": 640, "height": 360, "tags": {"rotate": "180"}}"#;
        let stream: FfprobeStream = serde_json::from_str(json).unwrap();
        assert_eq!(stream.rotation(), 180);
    }
}
