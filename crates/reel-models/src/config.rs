//! Pipeline configuration.
//!
//! A single immutable [`ReelConfig`] is loaded and validated once at the
//! pipeline entry point, then passed to each component at construction.
//! There are no reload semantics: a changed file means a new run.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::{CameraId, CameraRegistry};

/// Tolerance for the score-weight sum invariant.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Configuration load/validation errors. All fatal before any stage runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("score weights must sum to 1.0, got {sum:.6}")]
    WeightSum { sum: f64 },

    #[error("detection class weight refers to unconfigured class '{class}'")]
    UnknownDetectionClass { class: String },

    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Weights of the composite score terms. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub detect_score: f64,
    pub scene_boost: f64,
    pub speed_kmh: f64,
    pub gradient: f64,
    pub bbox_area: f64,
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.detect_score + self.scene_boost + self.speed_kmh + self.gradient + self.bbox_area
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            detect_score: 0.20,
            scene_boost: 0.35,
            speed_kmh: 0.25,
            gradient: 0.10,
            bbox_area: 0.10,
        }
    }
}

/// Detection capability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Object classes that count toward the detect score.
    pub classes: Vec<String>,
    /// Optional per-class weights; when set, the detect score is a
    /// class-weighted aggregate instead of a plain maximum.
    #[serde(default)]
    pub class_weights: Option<HashMap<String, f64>>,
    /// Confidence floor below which detections are ignored.
    pub min_confidence: f64,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            classes: vec!["bicycle".to_string()],
            class_weights: None,
            min_confidence: 0.10,
        }
    }
}

/// Clamp ranges that normalize raw sensor values into [0, 1] score terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringNorms {
    pub speed_min_kmh: f64,
    pub speed_max_kmh: f64,
    /// Gradient at or above which the climb term saturates. Descents
    /// contribute zero.
    pub gradient_max_pct: f64,
    /// Additive bonus for moments observed by both cameras; applied after
    /// matching without renormalization.
    pub dual_camera_bonus: f64,
}

impl Default for ScoringNorms {
    fn default() -> Self {
        Self {
            speed_min_kmh: 0.0,
            speed_max_kmh: 60.0,
            gradient_max_pct: 8.0,
            dual_camera_bonus: 0.05,
        }
    }
}

/// Per-zone cap on accepted moments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneCap {
    /// Absolute number of moments.
    Count(usize),
    /// Fraction of the total clip budget, rounded down (min 0).
    Fraction(f64),
}

impl ZoneCap {
    /// Resolve the cap against the run's clip budget.
    pub fn resolve(&self, clip_budget: usize) -> usize {
        match self {
            ZoneCap::Count(n) => *n,
            ZoneCap::Fraction(f) => (clip_budget as f64 * f).floor() as usize,
        }
    }
}

/// Start/end zone partition of session time and the caps applied to each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneRules {
    pub start_zone_duration_s: f64,
    pub end_zone_duration_s: f64,
    pub start_zone_cap: ZoneCap,
    pub end_zone_cap: ZoneCap,
    /// When true, zone moments skipped by the cap stay eligible as bonus
    /// picks that add to (rather than count against) the target duration.
    pub bonus_zone_clips: bool,
}

impl Default for ZoneRules {
    fn default() -> Self {
        Self {
            start_zone_duration_s: 1200.0,
            end_zone_duration_s: 1200.0,
            start_zone_cap: ZoneCap::Fraction(0.10),
            end_zone_cap: ZoneCap::Fraction(0.10),
            bonus_zone_clips: false,
        }
    }
}

/// Scene-aware relaxation of the minimum gap: strong scene changes may sit
/// closer to their neighbors. Multipliers of 1.0 disable the behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SceneGapSettings {
    pub high_threshold: f64,
    pub major_threshold: f64,
    pub high_multiplier: f64,
    pub major_multiplier: f64,
}

impl SceneGapSettings {
    /// Effective minimum gap for a moment with the given scene boost.
    pub fn effective_gap(&self, min_gap_s: f64, scene_boost: f64) -> f64 {
        if scene_boost >= self.major_threshold {
            min_gap_s * self.major_multiplier
        } else if scene_boost >= self.high_threshold {
            min_gap_s * self.high_multiplier
        } else {
            min_gap_s
        }
    }
}

impl Default for SceneGapSettings {
    fn default() -> Self {
        Self {
            high_threshold: 0.50,
            major_threshold: 0.70,
            high_multiplier: 0.75,
            major_multiplier: 0.50,
        }
    }
}

/// Candidate selection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    pub target_duration_s: f64,
    pub pre_roll_s: f64,
    pub clip_len_s: f64,
    pub min_gap_s: f64,
    /// Moments scoring below this floor never enter the ranked walk.
    pub min_score: f64,
    pub scene_gap: SceneGapSettings,
    pub zones: ZoneRules,
}

impl SelectionSettings {
    /// Footage consumed per accepted clip.
    pub fn clip_total_s(&self) -> f64 {
        self.pre_roll_s + self.clip_len_s
    }

    /// Number of clips the target duration pays for.
    pub fn clip_budget(&self) -> usize {
        (self.target_duration_s / self.clip_total_s()).ceil() as usize
    }
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            target_duration_s: 180.0,
            pre_roll_s: 0.2,
            clip_len_s: 2.8,
            min_gap_s: 45.0,
            min_score: 0.10,
            scene_gap: SceneGapSettings::default(),
            zones: ZoneRules::default(),
        }
    }
}

/// Time alignment parameters: the sampling grid, matching tolerances and
/// the camera metadata corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSettings {
    /// Sampling grid interval, anchored to the GPX start.
    pub sample_interval_s: f64,
    /// Fallback partner-matching tolerance on `session_ts_s`.
    pub partner_tolerance_s: f64,
    /// Nearest-telemetry tolerance; beyond it fields stay absent.
    pub telemetry_tolerance_s: f64,
    /// Correction added to every GPX epoch (mis-set GPS clock).
    pub gpx_time_offset_s: f64,
    /// Camera wall-clock timezone, hours east of UTC.
    pub camera_tz_offset_hours: f64,
    /// The cameras stamp local wall-clock time with a bogus `Z` suffix;
    /// when true, creation times are reinterpreted in the camera timezone.
    pub creation_time_is_local_wrong_z: bool,
    /// Known per-model creation-time biases, seconds. Positive means the
    /// device stamps after the true recording end.
    pub model_offsets: HashMap<String, f64>,
    /// Per-camera score multipliers.
    pub camera_weights: HashMap<String, f64>,
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        let mut model_offsets = HashMap::new();
        model_offsets.insert("Fly12Sport".to_string(), 2.0);
        model_offsets.insert("Fly6Pro".to_string(), 0.0);

        let mut camera_weights = HashMap::new();
        camera_weights.insert("Fly12Sport".to_string(), 1.0);
        camera_weights.insert("Fly6Pro".to_string(), 1.0);

        Self {
            sample_interval_s: 5.0,
            partner_tolerance_s: 1.0,
            telemetry_tolerance_s: 1.0,
            gpx_time_offset_s: 0.0,
            camera_tz_offset_hours: 10.0,
            creation_time_is_local_wrong_z: true,
            model_offsets,
            camera_weights,
        }
    }
}

/// Worker pool sizing and batch degradation policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkerSettings {
    /// Concurrency for externally-bound work (probes, model inference).
    pub external_parallelism: usize,
    /// Fraction of a fanned-out batch that may fail before the whole
    /// stage aborts instead of degrading.
    pub max_missing_fraction: f64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            external_parallelism: 3,
            max_missing_fraction: 0.5,
        }
    }
}

/// The complete, validated pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub weights: ScoreWeights,
    pub detection: DetectionSettings,
    pub scoring: ScoringNorms,
    pub selection: SelectionSettings,
    pub alignment: AlignmentSettings,
    pub workers: WorkerSettings,
}

impl ReelConfig {
    /// Load a configuration file (JSON) and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every invariant the components assume.
    ///
    /// Runs once at the pipeline entry point; components never re-check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;

        if let Some(class_weights) = &self.detection.class_weights {
            for class in class_weights.keys() {
                if !self.detection.classes.contains(class) {
                    return Err(ConfigError::UnknownDetectionClass {
                        class: class.clone(),
                    });
                }
            }
        }
        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(invalid("detection.min_confidence", "must be in [0, 1]"));
        }

        if self.alignment.sample_interval_s <= 0.0 {
            return Err(invalid("alignment.sample_interval_s", "must be positive"));
        }
        if self.alignment.partner_tolerance_s < 0.0 {
            return Err(invalid("alignment.partner_tolerance_s", "must be non-negative"));
        }
        if self.alignment.telemetry_tolerance_s < 0.0 {
            return Err(invalid("alignment.telemetry_tolerance_s", "must be non-negative"));
        }

        if self.scoring.speed_max_kmh <= self.scoring.speed_min_kmh {
            return Err(invalid("scoring.speed_max_kmh", "must exceed speed_min_kmh"));
        }
        if self.scoring.gradient_max_pct <= 0.0 {
            return Err(invalid("scoring.gradient_max_pct", "must be positive"));
        }

        let sel = &self.selection;
        if sel.target_duration_s <= 0.0 {
            return Err(invalid("selection.target_duration_s", "must be positive"));
        }
        if sel.clip_len_s <= 0.0 {
            return Err(invalid("selection.clip_len_s", "must be positive"));
        }
        if sel.pre_roll_s < 0.0 {
            return Err(invalid("selection.pre_roll_s", "must be non-negative"));
        }
        if sel.min_gap_s < 0.0 {
            return Err(invalid("selection.min_gap_s", "must be non-negative"));
        }
        for (field, mult) in [
            ("selection.scene_gap.high_multiplier", sel.scene_gap.high_multiplier),
            ("selection.scene_gap.major_multiplier", sel.scene_gap.major_multiplier),
        ] {
            if !(mult > 0.0 && mult <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: "must be in (0, 1]".to_string(),
                });
            }
        }
        if let ZoneCap::Fraction(f) = sel.zones.start_zone_cap {
            if !(0.0..=1.0).contains(&f) {
                return Err(invalid("selection.zones.start_zone_cap", "fraction must be in [0, 1]"));
            }
        }
        if let ZoneCap::Fraction(f) = sel.zones.end_zone_cap {
            if !(0.0..=1.0).contains(&f) {
                return Err(invalid("selection.zones.end_zone_cap", "fraction must be in [0, 1]"));
            }
        }

        if self.workers.external_parallelism == 0 {
            return Err(invalid("workers.external_parallelism", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.workers.max_missing_fraction) {
            return Err(invalid("workers.max_missing_fraction", "must be in [0, 1]"));
        }

        Ok(())
    }

    /// Build the camera registry from the alignment settings.
    pub fn camera_registry(&self) -> CameraRegistry {
        let offsets = self
            .alignment
            .model_offsets
            .iter()
            .map(|(name, offset)| (CameraId::new(name.clone()), *offset))
            .collect();
        let weights = self
            .alignment
            .camera_weights
            .iter()
            .map(|(name, weight)| (CameraId::new(name.clone()), *weight))
            .collect();
        CameraRegistry::new(offsets, weights)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}
