//! GPS telemetry model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One sample of the uniformly-resampled (1 Hz) GPS timeline.
///
/// Built once per GPX import, ordered by `epoch`, immutable thereafter.
/// Speed and gradient are derived between consecutive samples, so the
/// first row (and rows after a GPS dropout) carry `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TelemetryPoint {
    /// Seconds since the Unix epoch, UTC.
    pub epoch: f64,
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    pub speed_kmh: Option<f64>,
    pub gradient_pct: Option<f64>,
    pub heart_rate_bpm: Option<u16>,
    pub cadence_rpm: Option<u16>,
}

impl TelemetryPoint {
    /// A bare positional sample with no derived or sensor fields.
    pub fn positional(epoch: f64, lat: f64, lon: f64, elevation_m: f64) -> Self {
        Self {
            epoch,
            lat,
            lon,
            elevation_m,
            speed_kmh: None,
            gradient_pct: None,
            heart_rate_bpm: None,
            cadence_rpm: None,
        }
    }
}
