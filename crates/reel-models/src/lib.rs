//! Shared data models for the RideReel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - GPS telemetry points and the session time model
//! - Camera identification and the per-model offset registry
//! - Sampled, enriched and matched moments
//! - Selection results and their diagnostics
//! - The validated pipeline configuration

pub mod camera;
pub mod config;
pub mod moment;
pub mod report;
pub mod selection;
pub mod telemetry;
pub mod time;

// Re-export common types
pub use camera::{CameraId, CameraModel, CameraRegistry};
pub use config::{
    AlignmentSettings, ConfigError, DetectionSettings, ReelConfig, ScoreWeights, ScoringNorms,
    SelectionSettings, WorkerSettings, ZoneCap, ZoneRules,
};
pub use moment::{EnrichedMoment, Moment, SampledMoment};
pub use report::{AlignmentWarning, EnrichmentGap, GapKind};
pub use selection::{
    ClipTiming, Provenance, SelectedClip, SelectionDiagnostics, SelectionMode, SelectionResult,
};
pub use telemetry::TelemetryPoint;
pub use time::{format_seconds, moment_id, ClipTime, SessionTime};
