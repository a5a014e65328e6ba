//! The pipeline executor: a linear state machine over the stages.
//!
//! Stage N+1 never starts before stage N is done; a failed stage halts
//! the chain with no automatic retry at this layer. Re-running a
//! completed stage with unchanged inputs reproduces the same outputs,
//! which is what makes artifact-presence resumption safe.

use std::collections::BTreeMap;

use tracing::{error, info};

use crate::artifact::{write_json, ArtifactId};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::stage::{Action, StageName, StageStatus};
use crate::stages;

pub struct PipelineExecutor {
    ctx: PipelineContext,
    states: BTreeMap<StageName, StageStatus>,
}

impl PipelineExecutor {
    /// Create an executor. This is the single validation point: a context
    /// whose configuration is invalid never produces an executor.
    pub fn new(ctx: PipelineContext) -> PipelineResult<Self> {
        ctx.config.validate()?;
        let states = StageName::all()
            .into_iter()
            .map(|stage| (stage, StageStatus::Pending))
            .collect();
        Ok(Self { ctx, states })
    }

    pub fn status(&self, stage: StageName) -> StageStatus {
        self.states.get(&stage).copied().unwrap_or_default()
    }

    pub fn states(&self) -> &BTreeMap<StageName, StageStatus> {
        &self.states
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run one stage: check preconditions, run the body, persist the run
    /// report. A precondition failure leaves the stage `pending`; a body
    /// failure marks it `failed` and propagates.
    pub async fn run_stage(&mut self, stage: StageName) -> PipelineResult<()> {
        self.check_preconditions(stage)?;

        self.states.insert(stage, StageStatus::Running);
        info!(stage = %stage, "Starting stage");

        let result = stages::run(&self.ctx, stage).await;
        self.persist_report();

        match result {
            Ok(()) => {
                self.states.insert(stage, StageStatus::Done);
                info!(stage = %stage, "Completed stage");
                Ok(())
            }
            Err(e) => {
                self.states.insert(stage, StageStatus::Failed);
                error!(stage = %stage, error = %e, "Stage failed");
                Err(e)
            }
        }
    }

    /// Run one high-level action (a stage group).
    pub async fn run_action(&mut self, action: Action) -> PipelineResult<()> {
        for &stage in action.stages() {
            self.run_stage(stage).await?;
        }
        Ok(())
    }

    /// Run the whole chain. With `resume`, stages whose outputs already
    /// exist and are fresh are skipped; the run picks up at the first
    /// stage that still has work to do.
    pub async fn run_all(&mut self, resume: bool) -> PipelineResult<()> {
        for stage in StageName::all() {
            if resume && self.outputs_fresh(stage) {
                info!(stage = %stage, "Outputs present and fresh, skipping");
                self.states.insert(stage, StageStatus::Done);
                continue;
            }
            self.run_stage(stage).await?;
        }
        Ok(())
    }

    /// Precondition gate: every required artifact must exist and must not
    /// be staler than what its own producer consumed.
    fn check_preconditions(&self, stage: StageName) -> PipelineResult<()> {
        for &artifact in stage.requires() {
            if !self.ctx.store.exists(artifact) {
                return Err(PipelineError::MissingArtifact { stage, artifact });
            }
            if self.is_stale(artifact) {
                return Err(PipelineError::StaleArtifact { stage, artifact });
            }
        }
        Ok(())
    }

    /// An artifact is stale when any artifact its producer required has a
    /// newer write stamp than the artifact itself.
    fn is_stale(&self, artifact: ArtifactId) -> bool {
        let Some(version) = self.ctx.store.version(artifact) else {
            return false;
        };
        let Some(producer) = StageName::producer_of(artifact) else {
            return false;
        };
        producer.requires().iter().any(|&upstream| {
            self.ctx
                .store
                .version(upstream)
                .is_some_and(|upstream_version| upstream_version > version)
        })
    }

    /// Whether a stage's outputs all exist and none is stale.
    fn outputs_fresh(&self, stage: StageName) -> bool {
        stage
            .produces()
            .iter()
            .all(|&artifact| self.ctx.store.exists(artifact) && !self.is_stale(artifact))
    }

    /// Best-effort persistence of the run report; report loss must never
    /// fail a stage that otherwise succeeded.
    fn persist_report(&self) {
        let snapshot = self.ctx.report_snapshot();
        if let Err(e) = write_json(self.ctx.store.as_ref(), ArtifactId::Report, &snapshot) {
            error!(error = %e, "Failed to persist run report");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactStore, MemoryArtifactStore};
    use crate::cancel::CancelToken;
    use crate::context::ProjectPaths;
    use reel_engine::{ConstantScene, NullDetection};
    use reel_media::FfprobeMediaProbe;
    use reel_models::ReelConfig;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn executor_with_store(store: Arc<MemoryArtifactStore>) -> PipelineExecutor {
        let ctx = PipelineContext::new(
            ReelConfig::default(),
            ProjectPaths {
                gpx_file: PathBuf::from("/nonexistent/ride.gpx"),
                videos_dir: PathBuf::from("/nonexistent"),
            },
            store,
            Arc::new(FfprobeMediaProbe),
            Arc::new(NullDetection),
            Arc::new(ConstantScene(0.0)),
            CancelToken::never(),
        );
        PipelineExecutor::new(ctx).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected_at_entry() {
        let mut config = ReelConfig::default();
        config.weights.detect_score = 0.9;
        let ctx = PipelineContext::new(
            config,
            ProjectPaths {
                gpx_file: PathBuf::from("ride.gpx"),
                videos_dir: PathBuf::from("."),
            },
            Arc::new(MemoryArtifactStore::new()),
            Arc::new(FfprobeMediaProbe),
            Arc::new(NullDetection),
            Arc::new(ConstantScene(0.0)),
            CancelToken::never(),
        );
        assert!(matches!(
            PipelineExecutor::new(ctx),
            Err(PipelineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_upstream_artifact_is_a_precondition_error() {
        let store = Arc::new(MemoryArtifactStore::new());
        let mut executor = executor_with_store(store);

        let err = executor.run_stage(StageName::Sample).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingArtifact {
                stage: StageName::Sample,
                artifact: ArtifactId::Telemetry,
            }
        ));
        // Precondition failures leave the stage pending, not failed.
        assert_eq!(executor.status(StageName::Sample), StageStatus::Pending);
    }

    #[tokio::test]
    async fn test_stale_upstream_artifact_detected() {
        let store = Arc::new(MemoryArtifactStore::new());
        // Sample's output written, then its input rewritten afterwards.
        store.write(ArtifactId::Telemetry, b"t1").unwrap();
        store.write(ArtifactId::Session, b"s1").unwrap();
        store
            .write(ArtifactId::Frames, b"moment_id,camera_id\n")
            .unwrap();
        store.write(ArtifactId::Telemetry, b"t2").unwrap();

        let mut executor = executor_with_store(store);
        let err = executor.run_stage(StageName::Enrich).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::StaleArtifact {
                stage: StageName::Enrich,
                artifact: ArtifactId::Frames,
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_stage_halts_and_is_marked() {
        let store = Arc::new(MemoryArtifactStore::new());
        let mut executor = executor_with_store(store);

        // Timeline fails on the missing GPX input.
        let err = executor.run_stage(StageName::Timeline).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
        assert_eq!(executor.status(StageName::Timeline), StageStatus::Failed);
    }
}
