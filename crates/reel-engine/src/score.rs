//! The weighted scoring function.
//!
//! `score_weighted` is a convex combination of the five score terms, each
//! normalized into [0, 1] before weighting. The weight-sum invariant is
//! checked once at configuration load, never here. The per-camera weight
//! multiplier and the dual-camera bonus are ranking aids applied on top
//! of the base score and may push it slightly above 1.0; the value is not
//! a probability after that point.

use reel_models::config::{ScoreWeights, ScoringNorms};
use reel_models::Moment;

/// Raw inputs to one score computation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub detect_score: f64,
    pub scene_boost: f64,
    pub bbox_area_frac: f64,
    /// Absent telemetry contributes zero, it never disqualifies.
    pub speed_kmh: Option<f64>,
    pub gradient_pct: Option<f64>,
}

/// Computes composite scores. Construction assumes a validated config.
#[derive(Debug, Clone, Copy)]
pub struct ScoreEngine {
    weights: ScoreWeights,
    norms: ScoringNorms,
}

impl ScoreEngine {
    pub fn new(weights: ScoreWeights, norms: ScoringNorms) -> Self {
        Self { weights, norms }
    }

    /// The convex combination of the normalized terms, in [0, 1].
    pub fn composite(&self, inputs: &ScoreInputs) -> f64 {
        let speed_norm = inputs
            .speed_kmh
            .map(|s| self.normalize_speed(s))
            .unwrap_or(0.0);
        let gradient_norm = inputs
            .gradient_pct
            .map(|g| self.normalize_gradient(g))
            .unwrap_or(0.0);

        self.weights.detect_score * inputs.detect_score.clamp(0.0, 1.0)
            + self.weights.scene_boost * inputs.scene_boost.clamp(0.0, 1.0)
            + self.weights.speed_kmh * speed_norm
            + self.weights.gradient * gradient_norm
            + self.weights.bbox_area * inputs.bbox_area_frac.clamp(0.0, 1.0)
    }

    /// Composite score with the per-camera multiplier applied.
    pub fn weighted(&self, inputs: &ScoreInputs, camera_weight: f64) -> f64 {
        self.composite(inputs) * camera_weight
    }

    /// Clamp-normalize speed into [0, 1] over the configured range.
    fn normalize_speed(&self, speed_kmh: f64) -> f64 {
        let range = self.norms.speed_max_kmh - self.norms.speed_min_kmh;
        ((speed_kmh - self.norms.speed_min_kmh) / range).clamp(0.0, 1.0)
    }

    /// Climbs only: descents contribute zero, saturating at the max.
    fn normalize_gradient(&self, gradient_pct: f64) -> f64 {
        (gradient_pct.max(0.0) / self.norms.gradient_max_pct).clamp(0.0, 1.0)
    }
}

/// Second scoring pass after partner matching: moments observed by both
/// cameras get a small additive bonus on every perspective. Scores are not
/// renormalized.
pub fn apply_dual_camera_bonus(moments: &mut [Moment], bonus: f64) {
    if bonus == 0.0 {
        return;
    }
    for moment in moments {
        if let Some(partner) = moment.partner.as_mut() {
            moment.primary.score_weighted += bonus;
            partner.score_weighted += bonus;
        }
    }
}
