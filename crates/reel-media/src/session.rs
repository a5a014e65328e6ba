//! Capture-session alignment model.
//!
//! A session is every recording from every camera for one ride. Once all
//! recordings' true starts are resolved, the session origin is the
//! earliest start, and per-camera offsets against the baseline camera are
//! reported for alignment diagnostics.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::info;

use reel_models::{AlignmentWarning, CameraId, SessionTime};

use crate::offsets::ResolvedStart;
use crate::probe::RecordingProbe;

/// One recording with its resolved true start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecording {
    pub camera_id: CameraId,
    pub video_path: PathBuf,
    pub clip_num: u32,
    /// Creation epoch as stamped by the device (after timezone repair).
    pub raw_creation_epoch: f64,
    pub duration_s: f64,
    pub fps: f64,
    pub derived_start_epoch: f64,
}

impl CameraRecording {
    /// Assemble a recording from its probe and resolved start.
    pub fn new(
        camera_id: CameraId,
        video_path: PathBuf,
        clip_num: u32,
        probe: &RecordingProbe,
        resolved: &ResolvedStart,
    ) -> Self {
        Self {
            camera_id,
            video_path,
            clip_num,
            raw_creation_epoch: resolved.start_epoch + probe.duration_s + resolved.model_offset_s,
            duration_s: probe.duration_s,
            fps: probe.fps,
            derived_start_epoch: resolved.start_epoch,
        }
    }

    pub fn end_epoch(&self) -> f64 {
        self.derived_start_epoch + self.duration_s
    }

    /// Whether an instant falls inside the recording window
    /// (`start <= epoch < start + duration`).
    pub fn contains(&self, epoch: f64) -> bool {
        epoch >= self.derived_start_epoch && epoch < self.end_epoch()
    }
}

/// All aligned recordings of a capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAlignment {
    /// Recordings ordered by (camera, clip number).
    pub recordings: Vec<CameraRecording>,
    pub session: SessionTime,
    /// Alignment findings accumulated while probing and resolving.
    pub warnings: Vec<AlignmentWarning>,
}

impl SessionAlignment {
    /// Build the session model from resolved recordings.
    ///
    /// Returns `None` when nothing could be aligned (no recordings).
    pub fn build(
        mut recordings: Vec<CameraRecording>,
        warnings: Vec<AlignmentWarning>,
    ) -> Option<Self> {
        let session = SessionTime::from_starts(
            recordings.iter().map(|r| r.derived_start_epoch),
        )?;
        recordings.sort_by(|a, b| {
            a.camera_id
                .cmp(&b.camera_id)
                .then(a.clip_num.cmp(&b.clip_num))
        });

        let alignment = Self {
            recordings,
            session,
            warnings,
        };
        alignment.log_diagnostics();
        Some(alignment)
    }

    /// Earliest recording start per camera.
    pub fn camera_starts(&self) -> BTreeMap<CameraId, f64> {
        let mut starts: BTreeMap<CameraId, f64> = BTreeMap::new();
        for recording in &self.recordings {
            starts
                .entry(recording.camera_id.clone())
                .and_modify(|s| *s = s.min(recording.derived_start_epoch))
                .or_insert(recording.derived_start_epoch);
        }
        starts
    }

    /// Per-camera offsets against the baseline (earliest) camera.
    pub fn camera_offsets(&self) -> BTreeMap<CameraId, f64> {
        self.camera_starts()
            .into_iter()
            .map(|(camera, start)| (camera, start - self.session.start_epoch))
            .collect()
    }

    /// Cameras present in the session.
    pub fn cameras(&self) -> Vec<CameraId> {
        self.camera_starts().into_keys().collect()
    }

    /// Recordings belonging to one camera, in clip order.
    pub fn recordings_for(&self, camera: &CameraId) -> Vec<&CameraRecording> {
        self.recordings
            .iter()
            .filter(|r| &r.camera_id == camera)
            .collect()
    }

    fn log_diagnostics(&self) {
        for (camera, offset) in self.camera_offsets() {
            if offset == 0.0 {
                info!(camera = %camera, "Baseline camera (earliest start)");
            } else {
                info!(
                    camera = %camera,
                    offset_s = format!("{offset:+.3}"),
                    "Camera starts after baseline"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(camera: &str, clip: u32, start: f64, duration: f64) -> CameraRecording {
        CameraRecording {
            camera_id: CameraId::new(camera),
            video_path: PathBuf::from(format!("/rides/{camera}_{clip:04}.MP4")),
            clip_num: clip,
            raw_creation_epoch: start + duration,
            duration_s: duration,
            fps: 30.0,
            derived_start_epoch: start,
        }
    }

    #[test]
    fn test_session_origin_is_earliest_start() {
        let alignment = SessionAlignment::build(
            vec![
                recording("Fly6Pro", 1, 1012.5, 600.0),
                recording("Fly12Sport", 1, 1000.0, 600.0),
            ],
            Vec::new(),
        )
        .unwrap();

        assert_eq!(alignment.session.start_epoch, 1000.0);
        let offsets = alignment.camera_offsets();
        assert_eq!(offsets[&CameraId::new("Fly12Sport")], 0.0);
        assert_eq!(offsets[&CameraId::new("Fly6Pro")], 12.5);
    }

    #[test]
    fn test_recording_window_contains() {
        let r = recording("Fly12Sport", 1, 1000.0, 600.0);
        assert!(r.contains(1000.0));
        assert!(r.contains(1599.9));
        assert!(!r.contains(1600.0));
        assert!(!r.contains(999.9));
    }

    #[test]
    fn test_recordings_sorted_by_camera_and_clip() {
        let alignment = SessionAlignment::build(
            vec![
                recording("Fly6Pro", 2, 1600.0, 600.0),
                recording("Fly12Sport", 1, 1000.0, 600.0),
                recording("Fly6Pro", 1, 1000.0, 600.0),
            ],
            Vec::new(),
        )
        .unwrap();

        let order: Vec<(String, u32)> = alignment
            .recordings
            .iter()
            .map(|r| (r.camera_id.as_str().to_string(), r.clip_num))
            .collect();
        assert_eq!(
            order,
            vec![
                ("Fly12Sport".to_string(), 1),
                ("Fly6Pro".to_string(), 1),
                ("Fly6Pro".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_empty_session() {
        assert!(SessionAlignment::build(Vec::new(), Vec::new()).is_none());
    }

    #[test]
    fn test_recordings_for_camera() {
        let alignment = SessionAlignment::build(
            vec![
                recording("Fly12Sport", 1, 1000.0, 600.0),
                recording("Fly6Pro", 1, 1005.0, 600.0),
                recording("Fly12Sport", 2, 1600.0, 600.0),
            ],
            Vec::new(),
        )
        .unwrap();

        let front = alignment.recordings_for(&CameraId::new("Fly12Sport"));
        assert_eq!(front.len(), 2);
        assert_eq!(front[0].clip_num, 1);
        assert_eq!(front[1].clip_num, 2);
    }
}
