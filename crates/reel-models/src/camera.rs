//! Camera identification and per-model properties.
//!
//! Centralizes camera name normalization (SD-card labels and firmware
//! variants map to one canonical name), the per-model creation-time bias
//! table, and per-camera scoring weights.

use std::collections::HashMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Known camera models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum CameraModel {
    Fly12Sport,
    Fly6Pro,
}

impl CameraModel {
    /// All known models.
    pub fn all() -> [CameraModel; 2] {
        [CameraModel::Fly12Sport, CameraModel::Fly6Pro]
    }

    /// Canonical name as it appears in file names and artifacts.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            CameraModel::Fly12Sport => "Fly12Sport",
            CameraModel::Fly6Pro => "Fly6Pro",
        }
    }

    /// Human-readable mounting position.
    pub fn display_name(&self) -> &'static str {
        match self {
            CameraModel::Fly12Sport => "Front",
            CameraModel::Fly6Pro => "Rear",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, CameraModel::Fly12Sport)
    }

    pub fn is_rear(&self) -> bool {
        matches!(self, CameraModel::Fly6Pro)
    }
}

/// Name aliases seen in the wild (SD-card labels, firmware casing).
const CAMERA_ALIASES: &[(&str, &str)] = &[
    ("Fly12S", "Fly12Sport"),
    ("Fly6", "Fly6Pro"),
];

/// Canonical camera identifier.
///
/// Construction normalizes known aliases; unrecognized names are preserved
/// verbatim so that downstream alignment can flag them instead of
/// silently remapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CameraId(String);

impl CameraId {
    /// Create an id from a raw camera name, normalizing aliases.
    pub fn new(name: impl Into<String>) -> Self {
        let raw = name.into();

        for model in CameraModel::all() {
            if raw.eq_ignore_ascii_case(model.canonical_name()) {
                return Self(model.canonical_name().to_string());
            }
        }
        for (alias, canonical) in CAMERA_ALIASES {
            if raw.eq_ignore_ascii_case(alias) {
                return Self((*canonical).to_string());
            }
        }

        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The known model behind this id, if any.
    pub fn model(&self) -> Option<CameraModel> {
        CameraModel::all()
            .into_iter()
            .find(|m| m.canonical_name() == self.0)
    }

    /// Whether this id maps to a known camera model.
    pub fn is_known(&self) -> bool {
        self.model().is_some()
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<CameraModel> for CameraId {
    fn from(model: CameraModel) -> Self {
        Self(model.canonical_name().to_string())
    }
}

/// Per-camera property lookups: creation-time bias and scoring weight.
///
/// Offsets come from configuration (built-in defaults, superseded by a
/// persisted per-project calibration); the registry itself is read-only
/// once built and safe to share across workers.
#[derive(Debug, Clone, Default)]
pub struct CameraRegistry {
    model_offsets: HashMap<CameraId, f64>,
    camera_weights: HashMap<CameraId, f64>,
}

impl CameraRegistry {
    pub fn new(
        model_offsets: HashMap<CameraId, f64>,
        camera_weights: HashMap<CameraId, f64>,
    ) -> Self {
        Self {
            model_offsets,
            camera_weights,
        }
    }

    /// Creation-time bias for a camera, in seconds.
    ///
    /// `None` means the model is unknown to the table; callers must treat
    /// that as zero bias and surface an alignment warning.
    pub fn model_offset(&self, camera: &CameraId) -> Option<f64> {
        self.model_offsets.get(camera).copied()
    }

    /// Scoring weight multiplier for a camera (1.0 when unconfigured).
    pub fn weight(&self, camera: &CameraId) -> f64 {
        self.camera_weights.get(camera).copied().unwrap_or(1.0)
    }

    /// Cameras with configured offsets.
    pub fn configured_cameras(&self) -> impl Iterator<Item = &CameraId> {
        self.model_offsets.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_normalization() {
        assert_eq!(CameraId::new("Fly12S").as_str(), "Fly12Sport");
        assert_eq!(CameraId::new("FLY12SPORT").as_str(), "Fly12Sport");
        assert_eq!(CameraId::new("fly6").as_str(), "Fly6Pro");
        assert_eq!(CameraId::new("Fly6Pro").as_str(), "Fly6Pro");
    }

    #[test]
    fn test_unknown_name_preserved() {
        let id = CameraId::new("GoPro11");
        assert_eq!(id.as_str(), "GoPro11");
        assert!(!id.is_known());
        assert_eq!(id.model(), None);
    }

    #[test]
    fn test_model_lookup() {
        assert_eq!(CameraId::new("Fly12Sport").model(), Some(CameraModel::Fly12Sport));
        assert!(CameraModel::Fly12Sport.is_front());
        assert!(CameraModel::Fly6Pro.is_rear());
        assert_eq!(CameraModel::Fly6Pro.display_name(), "Rear");
    }

    #[test]
    fn test_registry_offsets_and_weights() {
        let mut offsets = HashMap::new();
        offsets.insert(CameraId::new("Fly12Sport"), 2.0);
        let mut weights = HashMap::new();
        weights.insert(CameraId::new("Fly12Sport"), 1.5);

        let registry = CameraRegistry::new(offsets, weights);

        assert_eq!(registry.model_offset(&CameraId::new("Fly12Sport")), Some(2.0));
        assert_eq!(registry.model_offset(&CameraId::new("GoPro11")), None);
        assert_eq!(registry.weight(&CameraId::new("Fly12Sport")), 1.5);
        assert_eq!(registry.weight(&CameraId::new("Fly6Pro")), 1.0);
    }
}
