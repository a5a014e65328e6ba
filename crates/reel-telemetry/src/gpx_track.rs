//! GPX track parsing.
//!
//! The `gpx` crate handles track structure, coordinates and timestamps.
//! It does not expose `<extensions>`, so heart rate and cadence are
//! recovered with a secondary scan over the raw document, joined back to
//! trackpoints by timestamp.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::error::{TelemetryError, TelemetryResult};

/// A raw GPS trackpoint before resampling.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    /// Seconds since the Unix epoch, UTC.
    pub epoch: f64,
    pub lat: f64,
    pub lon: f64,
    pub elevation_m: f64,
    pub heart_rate_bpm: Option<u16>,
    pub cadence_rpm: Option<u16>,
}

/// Parse a GPX document into timestamped trackpoints, ordered by epoch.
///
/// Points without a timestamp are skipped; a document with none at all is
/// an error.
pub fn parse_gpx(raw: &str) -> TelemetryResult<Vec<TrackPoint>> {
    let gpx = gpx::read(Cursor::new(raw.as_bytes()))
        .map_err(|e| TelemetryError::GpxParse(e.to_string()))?;

    let sensors = scan_sensor_extensions(raw);

    let mut points = Vec::new();
    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let Some(time) = point.time else {
                    continue;
                };
                let iso = time
                    .format()
                    .map_err(|e| TelemetryError::GpxParse(e.to_string()))?;
                let utc = DateTime::parse_from_rfc3339(&iso)
                    .map_err(|e| TelemetryError::GpxParse(e.to_string()))?
                    .with_timezone(&Utc);

                let geo = point.point();
                let (heart_rate_bpm, cadence_rpm) = sensors
                    .get(&utc.timestamp_millis())
                    .copied()
                    .unwrap_or((None, None));

                points.push(TrackPoint {
                    epoch: utc.timestamp_millis() as f64 / 1000.0,
                    lat: geo.y(),
                    lon: geo.x(),
                    elevation_m: point.elevation.unwrap_or(0.0),
                    heart_rate_bpm,
                    cadence_rpm,
                });
            }
        }
    }

    if points.is_empty() {
        return Err(TelemetryError::NoTrackpoints);
    }

    points.sort_by(|a, b| a.epoch.total_cmp(&b.epoch));
    debug!(points = points.len(), "Parsed GPX track");
    Ok(points)
}

/// Scan raw GPX text for per-trackpoint heart rate and cadence extensions,
/// keyed by timestamp in epoch milliseconds.
fn scan_sensor_extensions(raw: &str) -> HashMap<i64, (Option<u16>, Option<u16>)> {
    static TRKPT_RE: OnceLock<Regex> = OnceLock::new();
    static TIME_RE: OnceLock<Regex> = OnceLock::new();
    static HR_RE: OnceLock<Regex> = OnceLock::new();
    static CAD_RE: OnceLock<Regex> = OnceLock::new();

    let trkpt_re =
        TRKPT_RE.get_or_init(|| Regex::new(r"(?s)<trkpt\b[^>]*>(.*?)</trkpt>").unwrap());
    let time_re = TIME_RE.get_or_init(|| Regex::new(r"<time>\s*([^<\s]+)\s*</time>").unwrap());
    let hr_re = HR_RE.get_or_init(|| Regex::new(r"<(?:[A-Za-z0-9]+:)?hr>\s*(\d+)\s*<").unwrap());
    let cad_re =
        CAD_RE.get_or_init(|| Regex::new(r"<(?:[A-Za-z0-9]+:)?cad(?:ence)?>\s*(\d+)\s*<").unwrap());

    let mut sensors = HashMap::new();
    for block in trkpt_re.captures_iter(raw) {
        let body = &block[1];
        let Some(time) = time_re.captures(body) else {
            continue;
        };
        let Ok(utc) = DateTime::parse_from_rfc3339(&time[1]) else {
            continue;
        };

        let hr = hr_re
            .captures(body)
            .and_then(|c| c[1].parse::<u16>().ok());
        let cad = cad_re
            .captures(body)
            .and_then(|c| c[1].parse::<u16>().ok());

        if hr.is_some() || cad.is_some() {
            sensors.insert(utc.with_timezone(&Utc).timestamp_millis(), (hr, cad));
        }
    }
    sensors
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"
     xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><trkseg>
    <trkpt lat="-27.4698" lon="153.0251">
      <ele>12.0</ele>
      <time>2024-05-04T20:00:00Z</time>
      <extensions><gpxtpx:TrackPointExtension>
        <gpxtpx:hr>121</gpxtpx:hr>
        <gpxtpx:cad>85</gpxtpx:cad>
      </gpxtpx:TrackPointExtension></extensions>
    </trkpt>
    <trkpt lat="-27.4699" lon="153.0252">
      <ele>12.5</ele>
      <time>2024-05-04T20:00:01Z</time>
    </trkpt>
  </trkseg></trk>
</gpx>"#;

    #[test]
    fn test_parse_points_and_sensors() {
        let points = parse_gpx(SAMPLE_GPX).unwrap();
        assert_eq!(points.len(), 2);

        let first = &points[0];
        assert!((first.lat - -27.4698).abs() < 1e-9);
        assert!((first.lon - 153.0251).abs() < 1e-9);
        assert_eq!(first.elevation_m, 12.0);
        assert_eq!(first.heart_rate_bpm, Some(121));
        assert_eq!(first.cadence_rpm, Some(85));

        let second = &points[1];
        assert_eq!(second.heart_rate_bpm, None);
        assert_eq!(second.cadence_rpm, None);
        assert_eq!(second.epoch - first.epoch, 1.0);
    }

    #[test]
    fn test_untimed_points_skipped() {
        let gpx = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="t" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="0.0" lon="0.0"><ele>1.0</ele></trkpt>
  </trkseg></trk>
</gpx>"#;
        assert!(matches!(parse_gpx(gpx), Err(TelemetryError::NoTrackpoints)));
    }

    #[test]
    fn test_invalid_document_rejected() {
        assert!(matches!(
            parse_gpx("not a gpx file"),
            Err(TelemetryError::GpxParse(_))
        ));
    }
}
