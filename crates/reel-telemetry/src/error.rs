//! Error types for telemetry operations.

use thiserror::Error;

pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to parse GPX: {0}")]
    GpxParse(String),

    #[error("GPX track contains no timestamped trackpoints")]
    NoTrackpoints,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
