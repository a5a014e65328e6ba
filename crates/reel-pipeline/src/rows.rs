//! Persisted artifact row and document types.
//!
//! Row structs pin the column order of the tabular artifacts; it must not
//! drift between runs, because downstream tools join on these columns.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use reel_media::CameraRecording;
use reel_models::{CameraId, EnrichedMoment, SampledMoment};

/// One row of the frame metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRow {
    pub moment_id: i64,
    pub camera_id: String,
    pub frame_index: u64,
    pub video_path: String,
    pub abs_time_epoch: f64,
}

impl From<&SampledMoment> for FrameRow {
    fn from(sample: &SampledMoment) -> Self {
        Self {
            moment_id: sample.moment_id,
            camera_id: sample.camera_id.as_str().to_string(),
            frame_index: sample.frame_index,
            video_path: sample.video_path.display().to_string(),
            abs_time_epoch: sample.abs_time_epoch,
        }
    }
}

impl From<FrameRow> for SampledMoment {
    fn from(row: FrameRow) -> Self {
        Self {
            moment_id: row.moment_id,
            camera_id: CameraId::new(row.camera_id),
            abs_time_epoch: row.abs_time_epoch,
            frame_index: row.frame_index,
            video_path: PathBuf::from(row.video_path),
        }
    }
}

/// One row of the enriched moment table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRow {
    pub moment_id: i64,
    pub camera_id: String,
    pub frame_index: u64,
    pub video_path: String,
    pub abs_time_epoch: f64,
    pub detect_score: f64,
    pub scene_boost: f64,
    pub speed_kmh: Option<f64>,
    pub gradient_pct: Option<f64>,
    pub bbox_area_frac: f64,
    pub score_weighted: f64,
}

impl From<&EnrichedMoment> for EnrichedRow {
    fn from(moment: &EnrichedMoment) -> Self {
        Self {
            moment_id: moment.sample.moment_id,
            camera_id: moment.sample.camera_id.as_str().to_string(),
            frame_index: moment.sample.frame_index,
            video_path: moment.sample.video_path.display().to_string(),
            abs_time_epoch: moment.sample.abs_time_epoch,
            detect_score: moment.detect_score,
            scene_boost: moment.scene_boost,
            speed_kmh: moment.speed_kmh,
            gradient_pct: moment.gradient_pct,
            bbox_area_frac: moment.bbox_area_frac,
            score_weighted: moment.score_weighted,
        }
    }
}

impl From<EnrichedRow> for EnrichedMoment {
    fn from(row: EnrichedRow) -> Self {
        Self {
            sample: SampledMoment {
                moment_id: row.moment_id,
                camera_id: CameraId::new(row.camera_id),
                abs_time_epoch: row.abs_time_epoch,
                frame_index: row.frame_index,
                video_path: PathBuf::from(row.video_path),
            },
            detect_score: row.detect_score,
            bbox_area_frac: row.bbox_area_frac,
            scene_boost: row.scene_boost,
            speed_kmh: row.speed_kmh,
            gradient_pct: row.gradient_pct,
            score_weighted: row.score_weighted,
        }
    }
}

/// One row of the selection table: the enriched columns plus matching and
/// recommendation state. Two rows per dual-camera moment, at most one of
/// them recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRow {
    pub moment_id: i64,
    pub camera_id: String,
    pub frame_index: u64,
    pub video_path: String,
    pub abs_time_epoch: f64,
    pub detect_score: f64,
    pub scene_boost: f64,
    pub speed_kmh: Option<f64>,
    pub gradient_pct: Option<f64>,
    pub bbox_area_frac: f64,
    pub score_weighted: f64,
    pub partner_moment_id: Option<i64>,
    pub is_single_camera: bool,
    pub recommended: bool,
}

impl SelectionRow {
    pub fn from_enriched(
        moment: &EnrichedMoment,
        partner_moment_id: Option<i64>,
        recommended: bool,
    ) -> Self {
        let enriched = EnrichedRow::from(moment);
        Self {
            moment_id: enriched.moment_id,
            camera_id: enriched.camera_id,
            frame_index: enriched.frame_index,
            video_path: enriched.video_path,
            abs_time_epoch: enriched.abs_time_epoch,
            detect_score: enriched.detect_score,
            scene_boost: enriched.scene_boost,
            speed_kmh: enriched.speed_kmh,
            gradient_pct: enriched.gradient_pct,
            bbox_area_frac: enriched.bbox_area_frac,
            score_weighted: enriched.score_weighted,
            partner_moment_id,
            is_single_camera: partner_moment_id.is_none(),
            recommended,
        }
    }
}

/// The session alignment document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDoc {
    pub session_start_epoch: f64,
    pub recordings: Vec<CameraRecording>,
}

/// One source feeding a render clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSource {
    pub camera_id: String,
    pub video_path: String,
    /// Seek position within the source video, pre-roll already applied.
    pub seek_start_s: f64,
}

/// One clip of the render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderClip {
    pub moment_id: i64,
    pub session_ts_s: f64,
    pub pre_roll_s: f64,
    pub clip_length_s: f64,
    pub primary: RenderSource,
    pub partner: Option<RenderSource>,
}

/// The render plan consumed by the external render capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderPlanDoc {
    /// Clips in reel (chronological) order.
    pub clips: Vec<RenderClip>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{from_csv, to_csv};

    fn sample() -> SampledMoment {
        SampledMoment {
            moment_id: 1000,
            camera_id: CameraId::new("Fly12Sport"),
            abs_time_epoch: 1000.2,
            frame_index: 42,
            video_path: PathBuf::from("/rides/Fly12Sport_0001.MP4"),
        }
    }

    #[test]
    fn test_frame_row_round_trip() {
        let original = sample();
        let row = FrameRow::from(&original);
        let back: SampledMoment = row.into();
        assert_eq!(back, original);
    }

    #[test]
    fn test_enriched_row_csv_round_trip() {
        let moment = EnrichedMoment {
            sample: sample(),
            detect_score: 0.8,
            bbox_area_frac: 0.2,
            scene_boost: 0.3,
            speed_kmh: Some(25.0),
            gradient_pct: None,
            score_weighted: 0.41,
        };
        let bytes = to_csv(&[EnrichedRow::from(&moment)]).unwrap();
        let rows: Vec<EnrichedRow> = from_csv(&bytes).unwrap();
        let back: EnrichedMoment = rows[0].clone().into();
        assert_eq!(back, moment);
    }

    #[test]
    fn test_enriched_header_column_order() {
        let moment = EnrichedMoment {
            sample: sample(),
            detect_score: 0.0,
            bbox_area_frac: 0.0,
            scene_boost: 0.0,
            speed_kmh: None,
            gradient_pct: None,
            score_weighted: 0.0,
        };
        let bytes = to_csv(&[EnrichedRow::from(&moment)]).unwrap();
        let header = String::from_utf8(bytes).unwrap();
        assert!(header.starts_with(
            "moment_id,camera_id,frame_index,video_path,abs_time_epoch,\
             detect_score,scene_boost,speed_kmh,gradient_pct,bbox_area_frac,score_weighted"
        ));
    }

    #[test]
    fn test_selection_row_single_camera_flag() {
        let moment = EnrichedMoment {
            sample: sample(),
            detect_score: 0.0,
            bbox_area_frac: 0.0,
            scene_boost: 0.0,
            speed_kmh: None,
            gradient_pct: None,
            score_weighted: 0.5,
        };
        let paired = SelectionRow::from_enriched(&moment, Some(1000), true);
        assert!(!paired.is_single_camera);
        let single = SelectionRow::from_enriched(&moment, None, true);
        assert!(single.is_single_camera);
    }
}
