//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video stream information needed to decode and window frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Frame count reported by the container, if any
    pub frame_count: Option<u64>,
    /// Video codec
    pub codec: String,
}

impl VideoInfo {
    /// Bytes in one decoded RGB24 frame.
    pub fn rgb_frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Frames per window of `interval_secs` seconds (at least one).
    pub fn window_frames(&self, interval_secs: f64) -> u64 {
        window_frames(self.fps, interval_secs)
    }
}

/// Frames per window for a frame rate and interval, floored, at least one.
///
/// Fractional rates are scaled as-is; only the product is floored.
pub fn window_frames(fps: f64, interval_secs: f64) -> u64 {
    let frames = (fps * interval_secs).floor();
    if frames.is_finite() && frames >= 1.0 {
        frames as u64
    } else {
        1
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
}

/// Probe a video file for information.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

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
            message: format!("FFprobe could not open {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let (width, height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaError::InvalidVideo(
                "Video stream has no dimensions".to_string(),
            ))
        }
    };

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    // avg_frame_rate is "0/0" for some streams; fall back to r_frame_rate
    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(VideoInfo {
        duration,
        width,
        height,
        fps,
        frame_count: video_stream
            .nb_frames
            .as_ref()
            .and_then(|n| n.parse::<u64>().ok()),
        codec: video_stream.codec_name.clone().unwrap_or_default(),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (rate > 0.0).then_some(rate)
}
