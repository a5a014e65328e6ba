//! Resampling of raw trackpoints into the 1 Hz telemetry timeline.
//!
//! The timeline is built once per run and is read-only afterwards; every
//! later stage anchors to it.

use reel_models::TelemetryPoint;
use tracing::info;

use crate::gpx_track::TrackPoint;

/// Gradients outside this range are GPS noise, not road.
const GRADIENT_CLAMP_PCT: f64 = 25.0;

/// Timeline construction options.
#[derive(Debug, Clone, Copy)]
pub struct TimelineOptions {
    /// Resampling interval in seconds.
    pub resample_interval_s: f64,
    /// Correction added to every GPX epoch (mis-set GPS clock).
    pub gpx_time_offset_s: f64,
}

impl Default for TimelineOptions {
    fn default() -> Self {
        Self {
            resample_interval_s: 1.0,
            gpx_time_offset_s: 0.0,
        }
    }
}

/// Resample trackpoints to a uniform timeline and derive speed/gradient.
///
/// For each tick from the first to the last trackpoint timestamp the
/// nearest trackpoint is selected; speed and gradient are computed between
/// consecutive selected points, so repeated points (GPS dropouts) leave
/// those fields absent rather than fabricating zeros.
pub fn build_timeline(points: &[TrackPoint], options: TimelineOptions) -> Vec<TelemetryPoint> {
    if points.is_empty() {
        return Vec::new();
    }

    let mut rows: Vec<TelemetryPoint> = Vec::new();
    let end = points[points.len() - 1].epoch;
    let mut t = points[0].epoch;
    let mut gi = 0usize;

    while t <= end + 1e-9 {
        while gi + 1 < points.len() && points[gi + 1].epoch <= t {
            gi += 1;
        }
        let best = match points.get(gi + 1) {
            Some(next) if (next.epoch - t).abs() < (points[gi].epoch - t).abs() => next,
            _ => &points[gi],
        };

        let mut row = TelemetryPoint::positional(
            best.epoch + options.gpx_time_offset_s,
            best.lat,
            best.lon,
            best.elevation_m,
        );
        row.heart_rate_bpm = best.heart_rate_bpm;
        row.cadence_rpm = best.cadence_rpm;
        rows.push(row);

        t += options.resample_interval_s;
    }

    derive_motion(&mut rows);

    info!(
        trackpoints = points.len(),
        samples = rows.len(),
        "Built telemetry timeline"
    );
    rows
}

/// Fill in speed and gradient between consecutive timeline samples.
fn derive_motion(rows: &mut [TelemetryPoint]) {
    for i in 1..rows.len() {
        let dt = rows[i].epoch - rows[i - 1].epoch;
        if dt <= 0.0 {
            continue;
        }

        let d_m = haversine_m(
            rows[i - 1].lat,
            rows[i - 1].lon,
            rows[i].lat,
            rows[i].lon,
        );
        rows[i].speed_kmh = Some((d_m / dt) * 3.6);

        if d_m > 0.0 {
            let gradient = ((rows[i].elevation_m - rows[i - 1].elevation_m) / d_m) * 100.0;
            rows[i].gradient_pct = Some(gradient.clamp(-GRADIENT_CLAMP_PCT, GRADIENT_CLAMP_PCT));
        }
    }
}

/// Great-circle distance in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let (a1, b1) = (lat1.to_radians(), lon1.to_radians());
    let (a2, b2) = (lat2.to_radians(), lon2.to_radians());
    let da = a2 - a1;
    let db = b2 - b1;

    let h = (da / 2.0).sin().powi(2) + a1.cos() * a2.cos() * (db / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_point(epoch: f64, lat: f64, lon: f64, ele: f64) -> TrackPoint {
        TrackPoint {
            epoch,
            lat,
            lon,
            elevation_m: ele,
            heart_rate_bpm: None,
            cadence_rpm: None,
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // One degree of latitude is ~111.2 km.
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_timeline_resamples_to_one_hz() {
        let points: Vec<TrackPoint> = (0..10)
            .map(|i| track_point(1000.0 + i as f64, -27.0 + 0.0001 * i as f64, 153.0, 10.0))
            .collect();

        let rows = build_timeline(&points, TimelineOptions::default());
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0].epoch, 1000.0);
        assert_eq!(rows[9].epoch, 1009.0);
    }

    #[test]
    fn test_first_row_has_no_derived_motion() {
        let points = vec![
            track_point(0.0, 0.0, 0.0, 0.0),
            track_point(1.0, 0.0001, 0.0, 1.0),
        ];
        let rows = build_timeline(&points, TimelineOptions::default());
        assert!(rows[0].speed_kmh.is_none());
        assert!(rows[0].gradient_pct.is_none());
        assert!(rows[1].speed_kmh.is_some());
        assert!(rows[1].gradient_pct.is_some());
    }

    #[test]
    fn test_speed_derivation() {
        // ~11.1 m in 1 s -> ~40 km/h
        let points = vec![
            track_point(0.0, 0.0, 0.0, 0.0),
            track_point(1.0, 0.0001, 0.0, 0.0),
        ];
        let rows = build_timeline(&points, TimelineOptions::default());
        let speed = rows[1].speed_kmh.unwrap();
        assert!((speed - 40.0).abs() < 1.0, "speed was {speed}");
    }

    #[test]
    fn test_gradient_clamped() {
        // 50 m climb over ~11 m of travel is far beyond the clamp.
        let points = vec![
            track_point(0.0, 0.0, 0.0, 0.0),
            track_point(1.0, 0.0001, 0.0, 50.0),
        ];
        let rows = build_timeline(&points, TimelineOptions::default());
        assert_eq!(rows[1].gradient_pct, Some(GRADIENT_CLAMP_PCT));
    }

    #[test]
    fn test_gpx_time_offset_applied() {
        let points = vec![track_point(1000.0, 0.0, 0.0, 0.0)];
        let options = TimelineOptions {
            gpx_time_offset_s: -3.0,
            ..Default::default()
        };
        let rows = build_timeline(&points, options);
        assert_eq!(rows[0].epoch, 997.0);
    }

    #[test]
    fn test_empty_track() {
        assert!(build_timeline(&[], TimelineOptions::default()).is_empty());
    }
}
