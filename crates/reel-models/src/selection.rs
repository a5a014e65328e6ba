//! Selection results and diagnostics.

use serde::{Deserialize, Serialize};

use crate::moment::Moment;

/// How a clip entered the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Chosen by the selector.
    Auto,
    /// Overridden by an external review tool; recorded, never decided here.
    Manual,
}

/// Budget accounting mode for a selected clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Counts against the target reel duration.
    Core,
    /// Zone bonus pick; adds to the reel on top of the target duration.
    Bonus,
}

/// Clip timing within the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipTiming {
    pub session_ts_s: f64,
    pub pre_roll_s: f64,
    pub clip_length_s: f64,
}

impl ClipTiming {
    /// Total footage this clip consumes in the reel.
    pub fn total_s(&self) -> f64 {
        self.pre_roll_s + self.clip_length_s
    }
}

/// One selected moment with its assigned clip timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedClip {
    pub moment: Moment,
    pub timing: ClipTiming,
    pub mode: SelectionMode,
    pub provenance: Provenance,
}

/// Why candidates were rejected, by filter stage.
///
/// This is a required output of selection, not optional logging: when a
/// selection comes back empty it is the primary tuning tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDiagnostics {
    pub candidates: usize,
    pub accepted: usize,
    pub rejected_score_floor: usize,
    pub rejected_min_gap: usize,
    pub rejected_zone_cap: usize,
    pub rejected_duration_budget: usize,
}

impl SelectionDiagnostics {
    /// The filter stage that removed the most candidates, if any did.
    pub fn dominant_filter(&self) -> Option<&'static str> {
        let stages = [
            ("score_floor", self.rejected_score_floor),
            ("min_gap", self.rejected_min_gap),
            ("zone_cap", self.rejected_zone_cap),
            ("duration_budget", self.rejected_duration_budget),
        ];
        stages
            .into_iter()
            .filter(|(_, n)| *n > 0)
            .max_by_key(|(_, n)| *n)
            .map(|(name, _)| name)
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected_score_floor
            + self.rejected_min_gap
            + self.rejected_zone_cap
            + self.rejected_duration_budget
    }
}

/// The terminal artifact of the selection stage: chosen moments in
/// chronological order, with duration accounting and the rejection
/// breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Clips ordered by `session_ts_s` ascending.
    pub clips: Vec<SelectedClip>,
    /// Reel duration consumed by core clips.
    pub core_duration_s: f64,
    /// Additional duration contributed by zone bonus clips.
    pub bonus_duration_s: f64,
    pub diagnostics: SelectionDiagnostics,
}

impl SelectionResult {
    /// An empty selection carrying only its diagnostic breakdown.
    pub fn empty(diagnostics: SelectionDiagnostics) -> Self {
        Self {
            clips: Vec::new(),
            core_duration_s: 0.0,
            bonus_duration_s: 0.0,
            diagnostics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}
