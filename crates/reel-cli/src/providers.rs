//! Sidecar-file capability adapters.
//!
//! The detection model and the visual-difference metric are external
//! collaborators. When they have run, they leave per-frame results next
//! to the project (`detections.json`, `scene_scores.json`); these
//! adapters serve those results to the engine. Missing sidecars degrade
//! to empty results, which the enricher records as gaps.
//!
//! Sidecar keys are `<video file name>:<frame_index>`.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use reel_engine::{
    Detection, DetectionProvider, EngineError, EngineResult, FrameRef, SceneChangeProvider,
};

fn frame_key(frame: &FrameRef) -> String {
    let file_name = frame
        .video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{file_name}:{}", frame.frame_index)
}

/// Detections precomputed by the external model.
#[derive(Debug, Default)]
pub struct SidecarDetection {
    by_frame: HashMap<String, Vec<Detection>>,
    loaded: bool,
}

impl SidecarDetection {
    /// Load `detections.json` if the external model has produced it.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let by_frame: HashMap<String, Vec<Detection>> = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        info!(frames = by_frame.len(), "Loaded detection sidecar");
        Ok(Self {
            by_frame,
            loaded: true,
        })
    }
}

#[async_trait]
impl DetectionProvider for SidecarDetection {
    async fn detect(&self, frame: &FrameRef) -> EngineResult<Vec<Detection>> {
        if !self.loaded {
            return Err(EngineError::detection_failed("no detection sidecar present"));
        }
        Ok(self
            .by_frame
            .get(&frame_key(frame))
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Deserialize)]
struct SceneSidecar {
    scores: HashMap<String, f64>,
}

/// Scene-change scalars precomputed by the external visual-difference
/// tool, pre-normalized to [0, 1].
#[derive(Debug, Default)]
pub struct SidecarScene {
    scores: HashMap<String, f64>,
    loaded: bool,
}

impl SidecarScene {
    /// Load `scene_scores.json` if present.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let sidecar: SceneSidecar = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        info!(frames = sidecar.scores.len(), "Loaded scene-change sidecar");
        Ok(Self {
            scores: sidecar.scores,
            loaded: true,
        })
    }
}

#[async_trait]
impl SceneChangeProvider for SidecarScene {
    async fn scene_change(&self, frame: &FrameRef) -> EngineResult<f64> {
        if !self.loaded {
            return Err(EngineError::scene_change_failed(
                "no scene-change sidecar present",
            ));
        }
        Ok(self
            .scores
            .get(&frame_key(frame))
            .copied()
            .unwrap_or(0.0)
            .clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::CameraId;
    use std::path::PathBuf;

    fn frame(file: &str, index: u64) -> FrameRef {
        FrameRef {
            video_path: PathBuf::from(format!("/rides/{file}")),
            frame_index: index,
            camera_id: CameraId::new("Fly12Sport"),
            abs_time_epoch: 0.0,
        }
    }

    #[tokio::test]
    async fn test_missing_sidecar_reports_failure() {
        let detection = SidecarDetection::load("/nonexistent/detections.json").unwrap();
        assert!(detection.detect(&frame("a.MP4", 0)).await.is_err());

        let scene = SidecarScene::load("/nonexistent/scene_scores.json").unwrap();
        assert!(scene.scene_change(&frame("a.MP4", 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_sidecar_lookup() {
        let dir = tempfile::tempdir().unwrap();

        let detections_path = dir.path().join("detections.json");
        std::fs::write(
            &detections_path,
            r#"{"Fly12Sport_0001.MP4:150": [{"class": "bicycle", "confidence": 0.8,
                "bbox": {"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4}}]}"#,
        )
        .unwrap();
        let detection = SidecarDetection::load(&detections_path).unwrap();

        let hits = detection
            .detect(&frame("Fly12Sport_0001.MP4", 150))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].class, "bicycle");

        // Unlisted frame: a valid empty result, not an error.
        assert!(detection
            .detect(&frame("Fly12Sport_0001.MP4", 151))
            .await
            .unwrap()
            .is_empty());

        let scene_path = dir.path().join("scene_scores.json");
        std::fs::write(
            &scene_path,
            r#"{"scores": {"Fly12Sport_0001.MP4:150": 0.65}}"#,
        )
        .unwrap();
        let scene = SidecarScene::load(&scene_path).unwrap();
        assert_eq!(
            scene
                .scene_change(&frame("Fly12Sport_0001.MP4", 150))
                .await
                .unwrap(),
            0.65
        );
        assert_eq!(
            scene
                .scene_change(&frame("Fly12Sport_0001.MP4", 151))
                .await
                .unwrap(),
            0.0
        );
    }
}
