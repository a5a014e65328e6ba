//! Injected capabilities: object detection and scene change.
//!
//! The scoring engine consumes these as opaque inputs; which model
//! runtime (if any) sits behind them is a deployment decision, not an
//! engine concern.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use reel_models::CameraId;

use crate::error::{EngineError, EngineResult};

/// One sampled frame to run a capability against.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRef {
    pub video_path: PathBuf,
    pub frame_index: u64,
    pub camera_id: CameraId,
    pub abs_time_epoch: f64,
}

/// Axis-aligned box in frame-normalized coordinates ([0, 1] on each axis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Fraction of the frame this box covers.
    pub fn area_frac(&self) -> f64 {
        (self.width * self.height).clamp(0.0, 1.0)
    }
}

/// One detection returned by the model for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Object-detection capability (black box, per-frame).
#[async_trait]
pub trait DetectionProvider: Send + Sync {
    async fn detect(&self, frame: &FrameRef) -> EngineResult<Vec<Detection>>;
}

/// Visual-difference capability returning a scene-change scalar,
/// pre-normalized to [0, 1] relative to a short preceding window on the
/// same camera.
#[async_trait]
pub trait SceneChangeProvider: Send + Sync {
    async fn scene_change(&self, frame: &FrameRef) -> EngineResult<f64>;
}

/// Detection stub for degraded runs and tests: never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetection;

#[async_trait]
impl DetectionProvider for NullDetection {
    async fn detect(&self, _frame: &FrameRef) -> EngineResult<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Scene-change stub returning a fixed scalar.
#[derive(Debug, Clone, Copy)]
pub struct ConstantScene(pub f64);

#[async_trait]
impl SceneChangeProvider for ConstantScene {
    async fn scene_change(&self, _frame: &FrameRef) -> EngineResult<f64> {
        if !(0.0..=1.0).contains(&self.0) {
            return Err(EngineError::scene_change_failed(format!(
                "scalar {} outside [0, 1]",
                self.0
            )));
        }
        Ok(self.0)
    }
}
