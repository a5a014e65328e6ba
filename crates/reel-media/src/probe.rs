//! FFprobe recording information.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use reel_models::CameraId;

use crate::error::{MediaError, MediaResult};

/// Metadata probed from one recording file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingProbe {
    /// Duration in seconds
    pub duration_s: f64,
    /// Frame rate (fps)
    pub fps: f64,
    /// Creation time exactly as stamped by the device. May be local
    /// wall-clock time wearing a bogus `Z`; the offset resolver repairs
    /// that, not the probe.
    pub raw_creation_time: DateTime<Utc>,
}

/// Media-probe capability.
///
/// The pipeline depends on this trait, not on ffprobe, so tests can
/// substitute synthetic recordings.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<RecordingProbe>;
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
    tags: Option<FfprobeFormatTags>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormatTags {
    creation_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// The real probe: ffprobe invoked as a subprocess.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeMediaProbe;

#[async_trait]
impl MediaProbe for FfprobeMediaProbe {
    async fn probe(&self, path: &Path) -> MediaResult<RecordingProbe> {
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

        let probe: FfprobeOutput = serde_json::from_slice(&output.stdout)?;

        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

        let duration_s = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let fps = video_stream
            .avg_frame_rate
            .as_ref()
            .or(video_stream.r_frame_rate.as_ref())
            .and_then(|r| parse_frame_rate(r))
            .unwrap_or(30.0);

        let raw_creation_time = probe
            .format
            .tags
            .as_ref()
            .and_then(|t| t.creation_time.as_ref())
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .ok_or_else(|| MediaError::MissingCreationTime(path.to_path_buf()))?;

        Ok(RecordingProbe {
            duration_s,
            fps,
            raw_creation_time,
        })
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
    }
    s.parse().ok()
}

/// Parse `<CameraName>_<clip_num>.MP4` into camera id and clip number.
pub fn parse_camera_and_clip(path: &Path) -> MediaResult<(CameraId, u32)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MediaError::UnrecognizedFileName(path.to_path_buf()))?;

    let (camera, clip) = stem
        .rsplit_once('_')
        .ok_or_else(|| MediaError::UnrecognizedFileName(path.to_path_buf()))?;
    let clip_num: u32 = clip
        .parse()
        .map_err(|_| MediaError::UnrecognizedFileName(path.to_path_buf()))?;

    Ok((CameraId::new(camera), clip_num))
}
