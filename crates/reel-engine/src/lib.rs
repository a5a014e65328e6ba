//! The highlight engine: sampling grid, enrichment and scoring, partner
//! matching, and the zone-aware candidate selector.
//!
//! Detection and scene-change inputs arrive through injected capabilities
//! so the engine has no dependency on any model runtime.

pub mod capability;
pub mod enrich;
pub mod error;
pub mod grid;
pub mod matcher;
pub mod score;
pub mod select;

pub use capability::{
    BoundingBox, ConstantScene, Detection, DetectionProvider, FrameRef, NullDetection,
    SceneChangeProvider,
};
pub use enrich::{EnrichOutcome, Enricher};
pub use error::{EngineError, EngineResult};
pub use grid::{realize_recording, sampling_grid};
pub use matcher::match_moments;
pub use score::{apply_dual_camera_bonus, ScoreEngine, ScoreInputs};
pub use select::Selector;
