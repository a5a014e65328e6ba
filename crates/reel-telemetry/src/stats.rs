//! Ride statistics for the run report.

use reel_models::TelemetryPoint;
use serde::{Deserialize, Serialize};

use crate::timeline::haversine_m;

/// Aggregate ride statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideStats {
    pub duration_s: f64,
    pub distance_km: f64,
    pub avg_speed_kmh: f64,
    pub total_climb_m: f64,
    pub avg_heart_rate_bpm: Option<f64>,
    pub avg_cadence_rpm: Option<f64>,
}

/// Compute ride statistics over the telemetry timeline.
pub fn ride_stats(points: &[TelemetryPoint]) -> RideStats {
    if points.len() < 2 {
        return RideStats::default();
    }

    let mut distance_m = 0.0;
    let mut climb_m = 0.0;
    let mut heart_rates: Vec<f64> = Vec::new();
    let mut cadences: Vec<f64> = Vec::new();

    for pair in points.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        distance_m += haversine_m(prev.lat, prev.lon, curr.lat, curr.lon);

        let gain = curr.elevation_m - prev.elevation_m;
        if gain > 0.0 {
            climb_m += gain;
        }
        if let Some(hr) = curr.heart_rate_bpm {
            heart_rates.push(hr as f64);
        }
        if let Some(cad) = curr.cadence_rpm {
            cadences.push(cad as f64);
        }
    }

    let duration_s = points[points.len() - 1].epoch - points[0].epoch;
    let distance_km = distance_m / 1000.0;
    let avg_speed_kmh = if duration_s > 0.0 {
        distance_km / (duration_s / 3600.0)
    } else {
        0.0
    };

    RideStats {
        duration_s,
        distance_km,
        avg_speed_kmh,
        total_climb_m: climb_m,
        avg_heart_rate_bpm: mean(&heart_rates),
        avg_cadence_rpm: mean(&cadences),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}
