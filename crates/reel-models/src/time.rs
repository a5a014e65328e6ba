//! The session time model.
//!
//! Three clocks meet here: two camera clocks (each corrected for a
//! per-model metadata bias) and the GPS track. Once every recording's true
//! start epoch is known, all absolute epochs are comparable and every
//! moment gets a canonical relative coordinate:
//!
//! ```text
//! abs_time_epoch   world-aligned timestamp (a shared grid point)
//! session_ts_s     abs_time_epoch - global_session_start_epoch
//! moment_id        round(abs_time_epoch)
//! offset_in_clip   abs_time_epoch - clip_start_epoch
//! ```

use serde::{Deserialize, Serialize};

/// Join key for samples of the same real-world instant.
///
/// Grid points are shared across cameras, so two samples of the same
/// moment round to the same id exactly; this is an equality join, not a
/// tolerance match.
pub fn moment_id(abs_time_epoch: f64) -> i64 {
    abs_time_epoch.round() as i64
}

/// Session time origin, derived once per capture session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionTime {
    /// Earliest derived recording start across all cameras.
    pub start_epoch: f64,
}

impl SessionTime {
    /// Derive the session origin from recording start epochs.
    ///
    /// Returns `None` when no recording could be aligned.
    pub fn from_starts<I: IntoIterator<Item = f64>>(starts: I) -> Option<Self> {
        starts
            .into_iter()
            .fold(None::<f64>, |min, s| Some(min.map_or(s, |m| m.min(s))))
            .map(|start_epoch| Self { start_epoch })
    }

    /// Canonical relative coordinate used for matching and gap checks.
    pub fn session_ts(&self, abs_time_epoch: f64) -> f64 {
        abs_time_epoch - self.start_epoch
    }
}

/// Position of a world-aligned instant within one recording.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipTime {
    pub abs_time_epoch: f64,
    pub clip_start_epoch: f64,
    pub duration_s: f64,
}

impl ClipTime {
    /// Seconds from clip start to this instant (negative if misaligned).
    pub fn offset_in_clip(&self) -> f64 {
        self.abs_time_epoch - self.clip_start_epoch
    }

    /// Seek position with pre-roll applied, clamped to the clip start.
    pub fn seek_start(&self, pre_roll_s: f64) -> f64 {
        (self.offset_in_clip() - pre_roll_s).max(0.0)
    }

    /// Whether the instant lies inside the recording window.
    pub fn is_valid_seek(&self) -> bool {
        let offset = self.offset_in_clip();
        (0.0..self.duration_s).contains(&offset)
    }

    /// Whether a full output clip can be cut from this position.
    pub fn fits_clip(&self, clip_len_s: f64) -> bool {
        let offset = self.offset_in_clip();
        offset >= 0.0 && offset + clip_len_s <= self.duration_s
    }
}

/// Format seconds as HH:MM:SS (or HH:MM:SS.mmm when fractional).
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moment_id_rounds_to_nearest_second() {
        assert_eq!(moment_id(1000.0), 1000);
        assert_eq!(moment_id(1000.4), 1000);
        assert_eq!(moment_id(1000.5), 1001);
        assert_eq!(moment_id(999.9), 1000);
    }

    #[test]
    fn test_session_time_from_starts() {
        let session = SessionTime::from_starts([1200.0, 1000.0, 1100.0]).unwrap();
        assert_eq!(session.start_epoch, 1000.0);
        assert_eq!(session.session_ts(1125.5), 125.5);
        assert!(SessionTime::from_starts([]).is_none());
    }

    #[test]
    fn test_clip_time_offsets() {
        let t = ClipTime {
            abs_time_epoch: 1010.0,
            clip_start_epoch: 1000.0,
            duration_s: 60.0,
        };
        assert_eq!(t.offset_in_clip(), 10.0);
        assert_eq!(t.seek_start(0.2), 9.8);
        assert!(t.is_valid_seek());
        assert!(t.fits_clip(2.8));
    }

    #[test]
    fn test_clip_time_seek_clamped_at_start() {
        let t = ClipTime {
            abs_time_epoch: 1000.1,
            clip_start_epoch: 1000.0,
            duration_s: 60.0,
        };
        assert_eq!(t.seek_start(0.5), 0.0);
    }

    #[test]
    fn test_clip_time_out_of_window() {
        let t = ClipTime {
            abs_time_epoch: 1070.0,
            clip_start_epoch: 1000.0,
            duration_s: 60.0,
        };
        assert!(!t.is_valid_seek());
        assert!(!t.fits_clip(2.8));
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00");
        assert_eq!(format_seconds(3661.0), "01:01:01");
        assert_eq!(format_seconds(90.5), "00:01:30.500");
    }
}
