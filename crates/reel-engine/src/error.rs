//! Error types for engine operations.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("detection failed: {0}")]
    DetectionFailed(String),

    #[error("scene-change input failed: {0}")]
    SceneChangeFailed(String),
}

impl EngineError {
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    pub fn scene_change_failed(message: impl Into<String>) -> Self {
        Self::SceneChangeFailed(message.into())
    }
}
