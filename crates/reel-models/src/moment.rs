//! Sampled, enriched and matched moments.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::camera::CameraId;

/// One (camera, grid-point) sample inside a recording window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledMoment {
    /// Join key across cameras: `round(abs_time_epoch)`.
    pub moment_id: i64,
    pub camera_id: CameraId,
    /// The shared grid point (world-aligned, identical across cameras).
    pub abs_time_epoch: f64,
    /// Frame index within the source video.
    pub frame_index: u64,
    pub video_path: PathBuf,
}

/// A sampled moment with telemetry, detection and scoring attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMoment {
    pub sample: SampledMoment,
    /// Detection confidence over the configured classes, in [0, 1].
    pub detect_score: f64,
    /// Area fraction of the most confident detection, in [0, 1].
    pub bbox_area_frac: f64,
    /// Externally supplied scene-change scalar, pre-normalized to [0, 1].
    pub scene_boost: f64,
    /// Nearest telemetry within tolerance; absent beyond it.
    pub speed_kmh: Option<f64>,
    pub gradient_pct: Option<f64>,
    /// Convex combination of the score terms; the dual-camera bonus may
    /// later push it slightly above 1.0 as a ranking aid.
    pub score_weighted: f64,
}

impl EnrichedMoment {
    pub fn moment_id(&self) -> i64 {
        self.sample.moment_id
    }

    pub fn camera_id(&self) -> &CameraId {
        &self.sample.camera_id
    }

    pub fn abs_time_epoch(&self) -> f64 {
        self.sample.abs_time_epoch
    }
}

/// A real-world instant after cross-camera matching.
///
/// Exists once its id is observed on at least one camera; `primary` is the
/// higher-scoring perspective, `partner` the other camera's sample when
/// one landed within tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moment {
    pub moment_id: i64,
    /// Time relative to the earliest aligned camera start.
    pub session_ts_s: f64,
    pub primary: EnrichedMoment,
    pub partner: Option<EnrichedMoment>,
}

impl Moment {
    /// Whether only one camera observed this moment.
    pub fn is_single_camera(&self) -> bool {
        self.partner.is_none()
    }

    /// Ranking score: the primary perspective's weighted score.
    pub fn best_score(&self) -> f64 {
        self.primary.score_weighted
    }

    /// Highest scene-change scalar across perspectives.
    pub fn scene_boost_max(&self) -> f64 {
        match &self.partner {
            Some(p) => self.primary.scene_boost.max(p.scene_boost),
            None => self.primary.scene_boost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enriched(camera: &str, score: f64, scene: f64) -> EnrichedMoment {
        EnrichedMoment {
            sample: SampledMoment {
                moment_id: 100,
                camera_id: CameraId::new(camera),
                abs_time_epoch: 100.0,
                frame_index: 30,
                video_path: PathBuf::from("/videos/a.MP4"),
            },
            detect_score: 0.5,
            bbox_area_frac: 0.1,
            scene_boost: scene,
            speed_kmh: Some(20.0),
            gradient_pct: None,
            score_weighted: score,
        }
    }

    #[test]
    fn test_single_camera_flag() {
        let m = Moment {
            moment_id: 100,
            session_ts_s: 40.0,
            primary: enriched("Fly12Sport", 0.6, 0.2),
            partner: None,
        };
        assert!(m.is_single_camera());
        assert_eq!(m.best_score(), 0.6);
        assert_eq!(m.scene_boost_max(), 0.2);
    }

    #[test]
    fn test_scene_boost_max_across_perspectives() {
        let m = Moment {
            moment_id: 100,
            session_ts_s: 40.0,
            primary: enriched("Fly12Sport", 0.6, 0.2),
            partner: Some(enriched("Fly6Pro", 0.4, 0.8)),
        };
        assert!(!m.is_single_camera());
        assert_eq!(m.scene_boost_max(), 0.8);
    }
}
