//! Telemetry enrichment and per-moment scoring.
//!
//! A failed capability never disqualifies a moment: the affected score
//! terms degrade to zero contribution, the gap is recorded, and the
//! moment is retained.

use tracing::debug;

use reel_models::config::{DetectionSettings, ReelConfig};
use reel_models::{CameraRegistry, EnrichedMoment, EnrichmentGap, GapKind, SampledMoment};
use reel_telemetry::TelemetryIndex;

use crate::capability::{Detection, DetectionProvider, FrameRef, SceneChangeProvider};
use crate::score::{ScoreEngine, ScoreInputs};

/// One enriched moment plus whatever degraded along the way.
#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub moment: EnrichedMoment,
    pub gaps: Vec<EnrichmentGap>,
}

/// Attaches telemetry, detection and scene inputs to sampled moments and
/// computes their composite score.
pub struct Enricher {
    score: ScoreEngine,
    detection: DetectionSettings,
    registry: CameraRegistry,
    telemetry_tolerance_s: f64,
}

impl Enricher {
    /// Build from a validated configuration.
    pub fn new(config: &ReelConfig) -> Self {
        Self {
            score: ScoreEngine::new(config.weights, config.scoring),
            detection: config.detection.clone(),
            registry: config.camera_registry(),
            telemetry_tolerance_s: config.alignment.telemetry_tolerance_s,
        }
    }

    /// Enrich one sampled moment.
    pub async fn enrich(
        &self,
        sample: SampledMoment,
        telemetry: &TelemetryIndex,
        detection: &dyn DetectionProvider,
        scene: &dyn SceneChangeProvider,
    ) -> EnrichOutcome {
        let mut gaps = Vec::new();

        let frame = FrameRef {
            video_path: sample.video_path.clone(),
            frame_index: sample.frame_index,
            camera_id: sample.camera_id.clone(),
            abs_time_epoch: sample.abs_time_epoch,
        };

        // Nearest telemetry within tolerance; beyond it the fields stay
        // absent rather than guessed.
        let nearest = telemetry
            .find_within_tolerance(sample.abs_time_epoch, self.telemetry_tolerance_s);
        let (speed_kmh, gradient_pct) = match nearest {
            Some(point) => (point.speed_kmh, point.gradient_pct),
            None => {
                gaps.push(gap(&sample, GapKind::Telemetry));
                (None, None)
            }
        };

        let (detect_score, bbox_area_frac) = match detection.detect(&frame).await {
            Ok(detections) => self.aggregate_detections(&detections),
            Err(e) => {
                debug!(moment_id = sample.moment_id, error = %e, "Detection unavailable");
                gaps.push(gap(&sample, GapKind::Detection));
                (0.0, 0.0)
            }
        };

        let scene_boost = match scene.scene_change(&frame).await {
            Ok(value) => value.clamp(0.0, 1.0),
            Err(e) => {
                debug!(moment_id = sample.moment_id, error = %e, "Scene input unavailable");
                gaps.push(gap(&sample, GapKind::SceneChange));
                0.0
            }
        };

        let inputs = ScoreInputs {
            detect_score,
            scene_boost,
            bbox_area_frac,
            speed_kmh,
            gradient_pct,
        };
        let camera_weight = self.registry.weight(&sample.camera_id);
        let score_weighted = self.score.weighted(&inputs, camera_weight);

        EnrichOutcome {
            moment: EnrichedMoment {
                sample,
                detect_score,
                bbox_area_frac,
                scene_boost,
                speed_kmh,
                gradient_pct,
                score_weighted,
            },
            gaps,
        }
    }

    /// Reduce a frame's detections to (detect_score, bbox_area_frac).
    ///
    /// The score is the maximum confidence across configured classes, or
    /// a class-weighted aggregate when per-class weights are configured;
    /// the box is always the most confident detection's.
    fn aggregate_detections(&self, detections: &[Detection]) -> (f64, f64) {
        let relevant: Vec<&Detection> = detections
            .iter()
            .filter(|d| {
                d.confidence >= self.detection.min_confidence
                    && self.detection.classes.contains(&d.class)
            })
            .collect();

        if relevant.is_empty() {
            return (0.0, 0.0);
        }

        let best = relevant
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .copied();
        let bbox_area_frac = best.map(|d| d.bbox.area_frac()).unwrap_or(0.0);

        let detect_score = match &self.detection.class_weights {
            Some(class_weights) => {
                let mut weighted_sum = 0.0;
                let mut weight_total = 0.0;
                for (class, weight) in class_weights {
                    let class_max = relevant
                        .iter()
                        .filter(|d| &d.class == class)
                        .map(|d| d.confidence)
                        .fold(0.0_f64, f64::max);
                    weighted_sum += weight * class_max;
                    weight_total += weight;
                }
                if weight_total > 0.0 {
                    weighted_sum / weight_total
                } else {
                    0.0
                }
            }
            None => best.map(|d| d.confidence).unwrap_or(0.0),
        };

        (detect_score.clamp(0.0, 1.0), bbox_area_frac)
    }
}

fn gap(sample: &SampledMoment, kind: GapKind) -> EnrichmentGap {
    EnrichmentGap {
        moment_id: sample.moment_id,
        camera_id: sample.camera_id.clone(),
        kind,
    }
}
