//! Stage names, states and the artifact dependency map.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    /// GPX -> telemetry table.
    Timeline,
    /// Probe recordings -> session alignment + camera offsets.
    Align,
    /// Sampling grid -> frame metadata table.
    Sample,
    /// Detection + telemetry + scoring -> enriched table.
    Enrich,
    /// Matching + selection -> selection table.
    Select,
    /// Selection -> render plan for the external encoder.
    Build,
}

impl StageName {
    /// All stages in execution order.
    pub fn all() -> [StageName; 6] {
        [
            StageName::Timeline,
            StageName::Align,
            StageName::Sample,
            StageName::Enrich,
            StageName::Select,
            StageName::Build,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Timeline => "timeline",
            StageName::Align => "align",
            StageName::Sample => "sample",
            StageName::Enrich => "enrich",
            StageName::Select => "select",
            StageName::Build => "build",
        }
    }

    /// Artifacts that must exist (and be fresh) before this stage runs.
    pub fn requires(&self) -> &'static [ArtifactId] {
        match self {
            StageName::Timeline => &[],
            StageName::Align => &[],
            StageName::Sample => &[ArtifactId::Telemetry, ArtifactId::Session],
            StageName::Enrich => &[ArtifactId::Frames, ArtifactId::Telemetry],
            StageName::Select => &[
                ArtifactId::Enriched,
                ArtifactId::Session,
                ArtifactId::Telemetry,
            ],
            StageName::Build => &[ArtifactId::Selection, ArtifactId::Session],
        }
    }

    /// Artifacts this stage produces. Only this stage writes them.
    pub fn produces(&self) -> &'static [ArtifactId] {
        match self {
            StageName::Timeline => &[ArtifactId::Telemetry],
            StageName::Align => &[ArtifactId::Session, ArtifactId::CameraOffsets],
            StageName::Sample => &[ArtifactId::Frames],
            StageName::Enrich => &[ArtifactId::Enriched],
            StageName::Select => &[ArtifactId::Selection],
            StageName::Build => &[ArtifactId::RenderPlan],
        }
    }

    /// The stage that produces an artifact.
    pub fn producer_of(artifact: ArtifactId) -> Option<StageName> {
        StageName::all()
            .into_iter()
            .find(|stage| stage.produces().contains(&artifact))
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage lifecycle: `pending -> running -> done | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    Running,
    Done,
    Failed,
}

/// High-level operator actions, each a group of stages (the GUI-era
/// buttons: prepare, analyze, select, build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Prepare,
    Analyze,
    Select,
    Build,
}

impl Action {
    pub fn stages(&self) -> &'static [StageName] {
        match self {
            Action::Prepare => &[StageName::Timeline, StageName::Align, StageName::Sample],
            Action::Analyze => &[StageName::Enrich],
            Action::Select => &[StageName::Select],
            Action::Build => &[StageName::Build],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_required_artifact_has_a_producer() {
        for stage in StageName::all() {
            for &artifact in stage.requires() {
                let producer = StageName::producer_of(artifact)
                    .unwrap_or_else(|| panic!("no producer for {artifact}"));
                assert!(
                    producer < stage,
                    "{producer} must run before {stage} to produce {artifact}"
                );
            }
        }
    }

    #[test]
    fn test_each_artifact_written_by_one_stage() {
        let mut seen = std::collections::HashSet::new();
        for stage in StageName::all() {
            for &artifact in stage.produces() {
                assert!(seen.insert(artifact), "{artifact} written by two stages");
            }
        }
    }

    #[test]
    fn test_actions_cover_all_stages_in_order() {
        let from_actions: Vec<StageName> = [
            Action::Prepare,
            Action::Analyze,
            Action::Select,
            Action::Build,
        ]
        .iter()
        .flat_map(|a| a.stages().iter().copied())
        .collect();
        assert_eq!(from_actions, StageName::all());
    }
}
