//! Typed artifact handles and the artifact store.
//!
//! Stages exchange data through named artifacts, never ad hoc file paths.
//! The filesystem store is the production implementation; the in-memory
//! store substitutes in tests without touching storage. Tabular artifacts
//! are CSV with a stable column order; structured ones are JSON.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

/// Every artifact the pipeline reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactId {
    /// 1 Hz telemetry table (CSV).
    Telemetry,
    /// Camera model offsets actually used, camera id -> seconds (JSON).
    /// An external calibration tool may correct this file; the corrected
    /// values supersede the built-in table on the next run.
    CameraOffsets,
    /// Session alignment: origin epoch plus resolved recordings (JSON).
    Session,
    /// Frame metadata table (CSV).
    Frames,
    /// Enriched moment table (CSV).
    Enriched,
    /// Selection table (CSV).
    Selection,
    /// Render plan handed to the external render capability (JSON).
    RenderPlan,
    /// Run-level report: warnings, gaps, stats (JSON).
    Report,
}

impl ArtifactId {
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactId::Telemetry => "telemetry.csv",
            ArtifactId::CameraOffsets => "camera_offsets.json",
            ArtifactId::Session => "session.json",
            ArtifactId::Frames => "frames.csv",
            ArtifactId::Enriched => "enriched.csv",
            ArtifactId::Selection => "selection.csv",
            ArtifactId::RenderPlan => "render_plan.json",
            ArtifactId::Report => "report.json",
        }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Artifact persistence.
///
/// `version` is a monotonic write stamp used for staleness checks: an
/// artifact is stale when something it was derived from has a newer
/// version.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, id: ArtifactId) -> bool;
    fn read(&self, id: ArtifactId) -> PipelineResult<Vec<u8>>;
    fn write(&self, id: ArtifactId, bytes: &[u8]) -> PipelineResult<()>;
    fn version(&self, id: ArtifactId) -> Option<u64>;
}

/// Filesystem store rooted at a project working directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, id: ArtifactId) -> PathBuf {
        self.root.join(id.file_name())
    }
}

impl ArtifactStore for FsArtifactStore {
    fn exists(&self, id: ArtifactId) -> bool {
        self.path_of(id).exists()
    }

    fn read(&self, id: ArtifactId) -> PipelineResult<Vec<u8>> {
        Ok(std::fs::read(self.path_of(id))?)
    }

    fn write(&self, id: ArtifactId, bytes: &[u8]) -> PipelineResult<()> {
        std::fs::create_dir_all(&self.root)?;
        std::fs::write(self.path_of(id), bytes)?;
        Ok(())
    }

    fn version(&self, id: ArtifactId) -> Option<u64> {
        let modified = std::fs::metadata(self.path_of(id)).ok()?.modified().ok()?;
        let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
        Some(nanos as u64)
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    entries: Mutex<HashMap<ArtifactId, (u64, Vec<u8>)>>,
    clock: AtomicU64,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn exists(&self, id: ArtifactId) -> bool {
        self.entries.lock().expect("store lock").contains_key(&id)
    }

    fn read(&self, id: ArtifactId) -> PipelineResult<Vec<u8>> {
        self.entries
            .lock()
            .expect("store lock")
            .get(&id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("artifact not found: {id}"),
                )
                .into()
            })
    }

    fn write(&self, id: ArtifactId, bytes: &[u8]) -> PipelineResult<()> {
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .lock()
            .expect("store lock")
            .insert(id, (stamp, bytes.to_vec()));
        Ok(())
    }

    fn version(&self, id: ArtifactId) -> Option<u64> {
        self.entries
            .lock()
            .expect("store lock")
            .get(&id)
            .map(|(stamp, _)| *stamp)
    }
}

/// Serialize rows to CSV with headers, stable column order.
pub fn to_csv<T: Serialize>(rows: &[T]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?)
}

/// Deserialize CSV bytes into rows. Empty input yields no rows.
pub fn from_csv<T: DeserializeOwned>(bytes: &[u8]) -> PipelineResult<Vec<T>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Read and parse a JSON artifact.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn ArtifactStore,
    id: ArtifactId,
) -> PipelineResult<T> {
    Ok(serde_json::from_slice(&store.read(id)?)?)
}

/// Serialize and write a JSON artifact.
pub fn write_json<T: Serialize>(
    store: &dyn ArtifactStore,
    id: ArtifactId,
    value: &T,
) -> PipelineResult<()> {
    store.write(id, &serde_json::to_vec_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        a: i64,
        b: Option<f64>,
    }

    #[test]
    fn test_csv_round_trip() {
        let rows = vec![Row { a: 1, b: Some(2.5) }, Row { a: 2, b: None }];
        let bytes = to_csv(&rows).unwrap();
        let parsed: Vec<Row> = from_csv(&bytes).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn test_memory_store_versions_are_monotonic() {
        let store = MemoryArtifactStore::new();
        store.write(ArtifactId::Telemetry, b"a").unwrap();
        store.write(ArtifactId::Frames, b"b").unwrap();
        assert!(store.version(ArtifactId::Frames) > store.version(ArtifactId::Telemetry));

        store.write(ArtifactId::Telemetry, b"c").unwrap();
        assert!(store.version(ArtifactId::Telemetry) > store.version(ArtifactId::Frames));
    }

    #[test]
    fn test_memory_store_read_missing() {
        let store = MemoryArtifactStore::new();
        assert!(!store.exists(ArtifactId::Selection));
        assert!(store.read(ArtifactId::Selection).is_err());
    }

    #[test]
    fn test_fs_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());

        assert!(!store.exists(ArtifactId::Telemetry));
        store.write(ArtifactId::Telemetry, b"epoch,lat\n").unwrap();
        assert!(store.exists(ArtifactId::Telemetry));
        assert_eq!(store.read(ArtifactId::Telemetry).unwrap(), b"epoch,lat\n");
        assert!(store.version(ArtifactId::Telemetry).is_some());
        assert_eq!(
            store.path_of(ArtifactId::Telemetry),
            dir.path().join("telemetry.csv")
        );
    }
}
