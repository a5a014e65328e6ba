//! Camera offset resolution.
//!
//! The cameras stamp `creation_time` at (or after) the end of a
//! recording, in local wall-clock time wearing a bogus `Z` suffix. The
//! true recording start is therefore
//!
//! ```text
//! derived_start_epoch = repaired_creation_epoch - (duration_s + model_offset)
//! ```
//!
//! where `model_offset` is the known per-model bias (positive means the
//! device stamps after the true recording end). A persisted per-project
//! calibration file supersedes the built-in table; an external
//! calibration tool writes it.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use reel_models::config::AlignmentSettings;
use reel_models::{CameraId, CameraRegistry};

use crate::error::MediaResult;

/// True recording start from raw metadata. Pure and deterministic.
pub fn derived_start_epoch(raw_creation_epoch: f64, duration_s: f64, model_offset_s: f64) -> f64 {
    raw_creation_epoch - (duration_s + model_offset_s)
}

/// Reinterpret a wrong-`Z` creation time in the camera's timezone.
///
/// When the device writes local wall-clock time marked as UTC, the real
/// UTC instant is the stamp minus the timezone offset.
pub fn repair_creation_time(
    raw: DateTime<Utc>,
    tz_offset_hours: f64,
    is_local_wrong_z: bool,
) -> DateTime<Utc> {
    if !is_local_wrong_z {
        return raw;
    }
    raw - Duration::milliseconds((tz_offset_hours * 3_600_000.0) as i64)
}

/// Outcome of resolving one recording's start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedStart {
    pub start_epoch: f64,
    pub model_offset_s: f64,
    /// The camera model was not in the offset table; zero bias was
    /// assumed and the caller must surface an alignment warning.
    pub unknown_model: bool,
}

/// Resolves raw creation-time metadata into true recording starts.
#[derive(Debug, Clone)]
pub struct OffsetResolver {
    registry: CameraRegistry,
    tz_offset_hours: f64,
    is_local_wrong_z: bool,
}

impl OffsetResolver {
    /// Build a resolver from the alignment settings, with an optional
    /// persisted calibration taking priority over the built-in table.
    pub fn new(
        settings: &AlignmentSettings,
        calibration: Option<HashMap<String, f64>>,
    ) -> Self {
        let mut offsets: HashMap<CameraId, f64> = settings
            .model_offsets
            .iter()
            .map(|(name, offset)| (CameraId::new(name.clone()), *offset))
            .collect();

        if let Some(calibration) = calibration {
            for (name, offset) in calibration {
                let camera = CameraId::new(name);
                debug!(camera = %camera, offset, "Applying calibrated camera offset");
                offsets.insert(camera, offset);
            }
        }

        let weights = settings
            .camera_weights
            .iter()
            .map(|(name, weight)| (CameraId::new(name.clone()), *weight))
            .collect();

        Self {
            registry: CameraRegistry::new(offsets, weights),
            tz_offset_hours: settings.camera_tz_offset_hours,
            is_local_wrong_z: settings.creation_time_is_local_wrong_z,
        }
    }

    /// Resolve a recording's true start epoch.
    pub fn resolve(
        &self,
        camera: &CameraId,
        raw_creation_time: DateTime<Utc>,
        duration_s: f64,
    ) -> ResolvedStart {
        let repaired =
            repair_creation_time(raw_creation_time, self.tz_offset_hours, self.is_local_wrong_z);
        let repaired_epoch = repaired.timestamp_millis() as f64 / 1000.0;

        let (model_offset_s, unknown_model) = match self.registry.model_offset(camera) {
            Some(offset) => (offset, false),
            None => {
                warn!(camera = %camera, "Unknown camera model, assuming zero offset");
                (0.0, true)
            }
        };

        ResolvedStart {
            start_epoch: derived_start_epoch(repaired_epoch, duration_s, model_offset_s),
            model_offset_s,
            unknown_model,
        }
    }

    pub fn registry(&self) -> &CameraRegistry {
        &self.registry
    }
}

/// Load a persisted calibration file (camera name -> offset seconds).
///
/// A missing file is not an error; it means no calibration has been done.
pub fn load_calibration(path: impl AsRef<Path>) -> MediaResult<Option<HashMap<String, f64>>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

/// Persist calibrated offsets so they supersede detection on the next run.
pub fn save_calibration(
    path: impl AsRef<Path>,
    offsets: &HashMap<String, f64>,
) -> MediaResult<()> {
    let raw = serde_json::to_string_pretty(offsets)?;
    std::fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> AlignmentSettings {
        AlignmentSettings {
            creation_time_is_local_wrong_z: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_start_epoch() {
        // creation=1000, duration=600, bias=2 -> start=398
        assert_eq!(derived_start_epoch(1000.0, 600.0, 2.0), 398.0);
    }

    #[test]
    fn test_resolver_uses_model_offset() {
        let resolver = OffsetResolver::new(&settings(), None);
        let creation = Utc.timestamp_opt(1000, 0).unwrap();

        let resolved = resolver.resolve(&CameraId::new("Fly12Sport"), creation, 600.0);
        assert_eq!(resolved.start_epoch, 398.0);
        assert_eq!(resolved.model_offset_s, 2.0);
        assert!(!resolved.unknown_model);
    }

    #[test]
    fn test_unknown_model_gets_zero_bias_and_flag() {
        let resolver = OffsetResolver::new(&settings(), None);
        let creation = Utc.timestamp_opt(1000, 0).unwrap();

        let resolved = resolver.resolve(&CameraId::new("GoPro11"), creation, 600.0);
        assert_eq!(resolved.start_epoch, 400.0);
        assert_eq!(resolved.model_offset_s, 0.0);
        assert!(resolved.unknown_model);
    }

    #[test]
    fn test_calibration_supersedes_builtin() {
        let mut calibration = HashMap::new();
        calibration.insert("Fly12Sport".to_string(), 3.5);
        let resolver = OffsetResolver::new(&settings(), Some(calibration));
        let creation = Utc.timestamp_opt(1000, 0).unwrap();

        let resolved = resolver.resolve(&CameraId::new("Fly12Sport"), creation, 600.0);
        assert_eq!(resolved.model_offset_s, 3.5);
        assert_eq!(resolved.start_epoch, 396.5);
    }

    #[test]
    fn test_wrong_z_repair() {
        // Stamped 20:00 "Z" but actually UTC+10 wall clock -> real 10:00 UTC.
        let raw = Utc.with_ymd_and_hms(2024, 5, 4, 20, 0, 0).unwrap();
        let repaired = repair_creation_time(raw, 10.0, true);
        assert_eq!(repaired, Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap());

        let untouched = repair_creation_time(raw, 10.0, false);
        assert_eq!(untouched, raw);
    }

    #[test]
    fn test_calibration_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_offsets.json");

        assert!(load_calibration(&path).unwrap().is_none());

        let mut offsets = HashMap::new();
        offsets.insert("Fly6Pro".to_string(), 1.25);
        save_calibration(&path, &offsets).unwrap();

        let loaded = load_calibration(&path).unwrap().unwrap();
        assert_eq!(loaded.get("Fly6Pro"), Some(&1.25));
    }
}
