//! Shared context for a pipeline run.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use reel_engine::{DetectionProvider, SceneChangeProvider};
use reel_media::MediaProbe;
use reel_models::ReelConfig;

use crate::artifact::ArtifactStore;
use crate::cancel::CancelToken;
use crate::report::RunReport;

/// Input locations for a project.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    /// The ride's GPX file.
    pub gpx_file: PathBuf,
    /// Directory holding `<Camera>_<clip>.MP4` recordings.
    pub videos_dir: PathBuf,
}

/// Everything a stage needs: validated config, the artifact store, the
/// injected collaborator capabilities, cancellation, and the run report.
///
/// Config, store and capabilities are shared read-only across workers;
/// only the report is mutated, behind its lock.
pub struct PipelineContext {
    pub config: Arc<ReelConfig>,
    pub paths: ProjectPaths,
    pub store: Arc<dyn ArtifactStore>,
    pub probe: Arc<dyn MediaProbe>,
    pub detection: Arc<dyn DetectionProvider>,
    pub scene: Arc<dyn SceneChangeProvider>,
    pub cancel: CancelToken,
    pub report: Mutex<RunReport>,
}

impl PipelineContext {
    /// Build a context from a validated configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ReelConfig,
        paths: ProjectPaths,
        store: Arc<dyn ArtifactStore>,
        probe: Arc<dyn MediaProbe>,
        detection: Arc<dyn DetectionProvider>,
        scene: Arc<dyn SceneChangeProvider>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            paths,
            store,
            probe,
            detection,
            scene,
            cancel,
            report: Mutex::new(RunReport::default()),
        }
    }

    /// Run a closure against the run report.
    pub fn with_report<R>(&self, f: impl FnOnce(&mut RunReport) -> R) -> R {
        let mut report = self.report.lock().expect("report lock");
        f(&mut report)
    }

    /// Snapshot the current report.
    pub fn report_snapshot(&self) -> RunReport {
        self.report.lock().expect("report lock").clone()
    }
}
