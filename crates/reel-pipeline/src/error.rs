//! Pipeline error types.
//!
//! Configuration and precondition errors abort a run immediately; every
//! other degradation is recorded per-record in the run report and the
//! pipeline continues.

use std::path::PathBuf;

use thiserror::Error;

use crate::artifact::ArtifactId;
use crate::stage::StageName;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] reel_models::ConfigError),

    #[error("cannot run stage '{stage}': required artifact '{artifact}' is missing")]
    MissingArtifact {
        stage: StageName,
        artifact: ArtifactId,
    },

    #[error("cannot run stage '{stage}': required artifact '{artifact}' is stale (an upstream artifact changed after it was produced)")]
    StaleArtifact {
        stage: StageName,
        artifact: ArtifactId,
    },

    #[error("required input missing: {0}")]
    MissingInput(PathBuf),

    #[error("no recordings could be aligned")]
    NoRecordings,

    #[error("telemetry timeline is empty; no grid anchor")]
    NoGridAnchor,

    #[error("enrichment degraded beyond tolerance: {affected} of {total} moments missing")]
    TooManyGaps { affected: usize, total: usize },

    #[error("run cancelled during stage '{stage}'")]
    Cancelled { stage: StageName },

    #[error("telemetry error: {0}")]
    Telemetry(#[from] reel_telemetry::TelemetryError),

    #[error("media error: {0}")]
    Media(#[from] reel_media::MediaError),

    #[error("engine error: {0}")]
    Engine(#[from] reel_engine::EngineError),

    #[error("artifact table error: {0}")]
    Csv(#[from] csv::Error),

    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error aborts the run before or at stage start
    /// (configuration and precondition failures).
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::Config(_)
                | PipelineError::MissingArtifact { .. }
                | PipelineError::StaleArtifact { .. }
                | PipelineError::MissingInput(_)
        )
    }
}
