//! The staged pipeline executor.
//!
//! A linear state machine over named stages, each declaring the typed
//! artifacts it requires and produces. Stages run strictly sequentially;
//! within a stage, per-item work fans out over a bounded worker pool with
//! deterministic output ordering. Completed artifacts make a stage
//! skippable, which is the whole resumability story: a partial run picks
//! up at the first stage whose outputs are missing or stale.

pub mod artifact;
pub mod cancel;
pub mod context;
pub mod error;
pub mod executor;
pub mod pool;
pub mod report;
pub mod rows;
pub mod stage;
pub mod stages;

pub use artifact::{ArtifactId, ArtifactStore, FsArtifactStore, MemoryArtifactStore};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use context::{PipelineContext, ProjectPaths};
pub use error::{PipelineError, PipelineResult};
pub use executor::PipelineExecutor;
pub use pool::{run_batch, BatchOutcome, ResourceClass};
pub use report::RunReport;
pub use stage::{Action, StageName, StageStatus};
