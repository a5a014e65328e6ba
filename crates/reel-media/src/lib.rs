//! Media probing and camera time alignment.
//!
//! This crate owns the boundary to the media-probe collaborator (ffprobe)
//! and everything needed to turn unreliable file metadata into true
//! recording-start epochs: the per-model bias table, the wall-clock
//! timezone repair, persisted calibration overrides, and the session
//! alignment model built from probed recordings.

pub mod error;
pub mod offsets;
pub mod probe;
pub mod session;

pub use error::{MediaError, MediaResult};
pub use offsets::{
    derived_start_epoch, load_calibration, repair_creation_time, save_calibration, OffsetResolver,
    ResolvedStart,
};
pub use probe::{parse_camera_and_clip, FfprobeMediaProbe, MediaProbe, RecordingProbe};
pub use session::{CameraRecording, SessionAlignment};
