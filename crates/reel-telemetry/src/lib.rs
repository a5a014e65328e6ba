//! GPX timeline builder and telemetry index.
//!
//! Parses a GPS track into the uniformly-sampled 1 Hz telemetry timeline
//! that anchors the whole pipeline, derives speed and gradient, and
//! provides O(log n) nearest-epoch lookup for enrichment.

pub mod error;
pub mod gpx_track;
pub mod index;
pub mod stats;
pub mod timeline;

pub use error::{TelemetryError, TelemetryResult};
pub use gpx_track::{parse_gpx, TrackPoint};
pub use index::TelemetryIndex;
pub use stats::{ride_stats, RideStats};
pub use timeline::{build_timeline, TimelineOptions};
