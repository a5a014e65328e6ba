//! Per-record degradation reports.
//!
//! Non-fatal conditions are recorded per record and aggregated into a
//! run-level report, so a partial dataset can still produce a best-effort
//! selection while the operator sees exactly what degraded.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::camera::CameraId;

/// Non-fatal alignment findings. The pipeline continues past all of
/// these; they are surfaced to the operator, never swallowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignmentWarning {
    /// Camera model not in the offset table; zero bias was assumed.
    UnknownCameraModel { camera_id: CameraId },
    /// A recording's window contained no sampling grid points.
    NoGridPoints {
        camera_id: CameraId,
        video_path: PathBuf,
    },
    /// A media probe failed; the recording contributes nothing.
    ProbeFailed {
        video_path: PathBuf,
        reason: String,
    },
}

/// Which enrichment input was missing for a moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// No telemetry sample within tolerance.
    Telemetry,
    /// Detection inference failed or returned nothing usable.
    Detection,
    /// Scene-change input unavailable.
    SceneChange,
}

/// A moment whose enrichment degraded: the affected score terms
/// contributed zero and the moment was retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentGap {
    pub moment_id: i64,
    pub camera_id: CameraId,
    pub kind: GapKind,
}
