//! The GPS-anchored global sampling grid.
//!
//! Sampling is anchored to the GPX timeline, never to any one camera's
//! clock, so two cameras sampling the same instant always compute the
//! identical grid value. An independent per-camera grid would reintroduce
//! floating rounding mismatches and break the exact moment-id join.

use tracing::warn;

use reel_media::CameraRecording;
use reel_models::{moment_id, AlignmentWarning, SampledMoment};

/// Generate the global grid: `start + k * interval` for k = 0, 1, 2, ...
/// while the value stays within `end_epoch`.
///
/// Each point is computed directly from `k` (no accumulation), so the
/// sequence is bit-identical across calls and platforms.
pub fn sampling_grid(start_epoch: f64, end_epoch: f64, interval_s: f64) -> Vec<f64> {
    let mut points = Vec::new();
    if interval_s <= 0.0 || end_epoch < start_epoch {
        return points;
    }

    let mut k = 0u64;
    loop {
        let point = start_epoch + k as f64 * interval_s;
        if point > end_epoch {
            break;
        }
        points.push(point);
        k += 1;
    }
    points
}

/// Realize the grid points that fall inside one recording's window.
///
/// Points before the GPX start are dropped pipeline-wide (the grid is
/// anchored there, but a caller may pass a wider grid after calibration).
/// A recording containing zero grid points contributes nothing; that is a
/// warning, not an error.
pub fn realize_recording(
    recording: &CameraRecording,
    grid: &[f64],
    gpx_start_epoch: f64,
) -> (Vec<SampledMoment>, Option<AlignmentWarning>) {
    let samples: Vec<SampledMoment> = grid
        .iter()
        .copied()
        .filter(|&point| point >= gpx_start_epoch && recording.contains(point))
        .map(|point| {
            let sec_into_clip = point - recording.derived_start_epoch;
            SampledMoment {
                moment_id: moment_id(point),
                camera_id: recording.camera_id.clone(),
                abs_time_epoch: point,
                frame_index: (sec_into_clip * recording.fps).floor() as u64,
                video_path: recording.video_path.clone(),
            }
        })
        .collect();

    let warning = if samples.is_empty() {
        warn!(
            camera = %recording.camera_id,
            video = %recording.video_path.display(),
            "Recording window contains no grid points"
        );
        Some(AlignmentWarning::NoGridPoints {
            camera_id: recording.camera_id.clone(),
            video_path: recording.video_path.clone(),
        })
    } else {
        None
    };

    (samples, warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::CameraId;
    use std::path::PathBuf;

    fn recording(start: f64, duration: f64) -> CameraRecording {
        CameraRecording {
            camera_id: CameraId::new("Fly12Sport"),
            video_path: PathBuf::from("/rides/Fly12Sport_0001.MP4"),
            clip_num: 1,
            raw_creation_epoch: start + duration,
            duration_s: duration,
            fps: 30.0,
            derived_start_epoch: start,
        }
    }

    #[test]
    fn test_grid_exact_sequence() {
        assert_eq!(sampling_grid(0.0, 12.0, 5.0), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_grid_includes_exact_end() {
        assert_eq!(sampling_grid(0.0, 10.0, 5.0), vec![0.0, 5.0, 10.0]);
    }

    #[test]
    fn test_grid_deterministic() {
        let a = sampling_grid(1_714_800_000.0, 1_714_803_600.0, 5.0);
        let b = sampling_grid(1_714_800_000.0, 1_714_803_600.0, 5.0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 721);
    }

    #[test]
    fn test_grid_degenerate_inputs() {
        assert!(sampling_grid(10.0, 5.0, 5.0).is_empty());
        assert!(sampling_grid(0.0, 10.0, 0.0).is_empty());
    }

    #[test]
    fn test_realize_respects_recording_window() {
        let grid = sampling_grid(0.0, 100.0, 5.0);
        let rec = recording(20.0, 30.0); // window [20, 50)

        let (samples, warning) = realize_recording(&rec, &grid, 0.0);
        assert!(warning.is_none());
        let epochs: Vec<f64> = samples.iter().map(|s| s.abs_time_epoch).collect();
        assert_eq!(epochs, vec![20.0, 25.0, 30.0, 35.0, 40.0, 45.0]);
    }

    #[test]
    fn test_realize_window_end_exclusive() {
        let grid = sampling_grid(0.0, 100.0, 5.0);
        let rec = recording(20.0, 30.0);
        let (samples, _) = realize_recording(&rec, &grid, 0.0);
        assert!(samples.iter().all(|s| s.abs_time_epoch < 50.0));
    }

    #[test]
    fn test_realize_drops_points_before_gpx_start() {
        let grid = sampling_grid(0.0, 100.0, 5.0);
        let rec = recording(0.0, 100.0);
        let (samples, _) = realize_recording(&rec, &grid, 30.0);
        assert_eq!(samples[0].abs_time_epoch, 30.0);
    }

    #[test]
    fn test_realize_frame_index_and_moment_id() {
        let grid = sampling_grid(0.0, 100.0, 5.0);
        let rec = recording(20.0, 30.0);
        let (samples, _) = realize_recording(&rec, &grid, 0.0);

        let first = &samples[0];
        assert_eq!(first.moment_id, 20);
        assert_eq!(first.frame_index, 0);

        let second = &samples[1];
        // 5 seconds into a 30 fps clip
        assert_eq!(second.frame_index, 150);
    }

    #[test]
    fn test_realize_empty_window_warns() {
        let grid = sampling_grid(0.0, 100.0, 5.0);
        let rec = recording(21.0, 3.0); // [21, 24) straddles no grid point

        let (samples, warning) = realize_recording(&rec, &grid, 0.0);
        assert!(samples.is_empty());
        assert!(matches!(
            warning,
            Some(AlignmentWarning::NoGridPoints { .. })
        ));
    }
}
