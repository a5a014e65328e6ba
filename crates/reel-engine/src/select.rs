//! The zone-aware, gap-constrained candidate selector.
//!
//! Selection order is by score; reel order is chronological. The greedy
//! walk accepts a moment only if it keeps the minimum spacing to every
//! already-accepted moment (a later, lower-ranked pick may land between
//! two earlier ones) and fits the duration budget. Start/end zones carry
//! their own caps; capped-out zone moments can return as explicit bonus
//! picks that add to, rather than count against, the target duration.

use tracing::{debug, info};

use reel_models::config::SelectionSettings;
use reel_models::{
    ClipTiming, Moment, Provenance, SelectedClip, SelectionDiagnostics, SelectionMode,
    SelectionResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Start,
    Middle,
    End,
}

/// The candidate selector. Construction assumes a validated config.
#[derive(Debug, Clone)]
pub struct Selector {
    settings: SelectionSettings,
}

impl Selector {
    pub fn new(settings: SelectionSettings) -> Self {
        Self { settings }
    }

    /// Choose the final ordered set of moments.
    ///
    /// `session_duration_s` defines where the trailing end zone begins.
    /// Deterministic: identical inputs produce the identical result. An
    /// empty outcome is a valid result carrying its diagnostic breakdown,
    /// not an error.
    pub fn select(&self, moments: &[Moment], session_duration_s: f64) -> SelectionResult {
        let clip_total = self.settings.clip_total_s();
        let clip_budget = self.settings.clip_budget();
        let start_cap = self.settings.zones.start_zone_cap.resolve(clip_budget);
        let end_cap = self.settings.zones.end_zone_cap.resolve(clip_budget);

        let mut diagnostics = SelectionDiagnostics {
            candidates: moments.len(),
            ..Default::default()
        };

        // Score floor, then rank: score descending, earlier moment wins
        // ties so reruns are reproducible.
        let mut ranked: Vec<&Moment> = moments
            .iter()
            .filter(|m| {
                let passes = m.best_score() >= self.settings.min_score;
                if !passes {
                    diagnostics.rejected_score_floor += 1;
                }
                passes
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.best_score()
                .total_cmp(&a.best_score())
                .then_with(|| a.session_ts_s.total_cmp(&b.session_ts_s))
        });

        let mut accepted: Vec<(&Moment, SelectionMode)> = Vec::new();
        let mut core_duration_s = 0.0;
        let mut start_used = 0usize;
        let mut end_used = 0usize;
        let mut bonus_eligible: Vec<&Moment> = Vec::new();

        for &moment in &ranked {
            if !self.keeps_gap(&accepted, moment) {
                diagnostics.rejected_min_gap += 1;
                continue;
            }

            let zone = self.zone_of(moment.session_ts_s, session_duration_s);
            let zone_open = match zone {
                Zone::Start => start_used < start_cap,
                Zone::End => end_used < end_cap,
                Zone::Middle => true,
            };
            if !zone_open {
                if self.settings.zones.bonus_zone_clips {
                    bonus_eligible.push(moment);
                } else {
                    diagnostics.rejected_zone_cap += 1;
                }
                continue;
            }

            if core_duration_s + clip_total > self.settings.target_duration_s + 1e-9 {
                diagnostics.rejected_duration_budget += 1;
                continue;
            }

            debug!(
                moment_id = moment.moment_id,
                session_ts_s = moment.session_ts_s,
                score = moment.best_score(),
                "Accepted core clip"
            );
            accepted.push((moment, SelectionMode::Core));
            core_duration_s += clip_total;
            match zone {
                Zone::Start => start_used += 1,
                Zone::End => end_used += 1,
                Zone::Middle => {}
            }
        }

        // Bonus pass: capped-out zone moments revisited in ranked order.
        // Each zone's bonus allowance equals its cap again; bonus clips
        // extend the reel beyond the target instead of consuming it.
        let mut bonus_duration_s = 0.0;
        if self.settings.zones.bonus_zone_clips {
            let mut bonus_start_used = 0usize;
            let mut bonus_end_used = 0usize;
            for moment in bonus_eligible {
                if !self.keeps_gap(&accepted, moment) {
                    diagnostics.rejected_min_gap += 1;
                    continue;
                }
                let zone = self.zone_of(moment.session_ts_s, session_duration_s);
                let bonus_open = match zone {
                    Zone::Start => bonus_start_used < start_cap,
                    Zone::End => bonus_end_used < end_cap,
                    Zone::Middle => false,
                };
                if !bonus_open {
                    diagnostics.rejected_zone_cap += 1;
                    continue;
                }

                debug!(
                    moment_id = moment.moment_id,
                    session_ts_s = moment.session_ts_s,
                    "Accepted zone bonus clip"
                );
                accepted.push((moment, SelectionMode::Bonus));
                bonus_duration_s += clip_total;
                match zone {
                    Zone::Start => bonus_start_used += 1,
                    Zone::End => bonus_end_used += 1,
                    Zone::Middle => {}
                }
            }
        }

        diagnostics.accepted = accepted.len();

        if accepted.is_empty() {
            info!(
                candidates = diagnostics.candidates,
                dominant_filter = diagnostics.dominant_filter().unwrap_or("none"),
                "Selection is empty"
            );
            return SelectionResult::empty(diagnostics);
        }

        // The reel plays chronologically, whatever order selection ran in.
        let mut clips: Vec<SelectedClip> = accepted
            .into_iter()
            .map(|(moment, mode)| SelectedClip {
                moment: moment.clone(),
                timing: ClipTiming {
                    session_ts_s: moment.session_ts_s,
                    pre_roll_s: self.settings.pre_roll_s,
                    clip_length_s: self.settings.clip_len_s,
                },
                mode,
                provenance: Provenance::Auto,
            })
            .collect();
        clips.sort_by(|a, b| a.timing.session_ts_s.total_cmp(&b.timing.session_ts_s));

        info!(
            accepted = clips.len(),
            core_duration_s,
            bonus_duration_s,
            "Selection complete"
        );

        SelectionResult {
            clips,
            core_duration_s,
            bonus_duration_s,
            diagnostics,
        }
    }

    /// Symmetric spacing check against every accepted moment, with the
    /// scene-aware relaxation applied to the candidate's gap.
    fn keeps_gap(&self, accepted: &[(&Moment, SelectionMode)], candidate: &Moment) -> bool {
        let gap = self
            .settings
            .scene_gap
            .effective_gap(self.settings.min_gap_s, candidate.scene_boost_max());
        accepted
            .iter()
            .all(|(a, _)| (a.session_ts_s - candidate.session_ts_s).abs() >= gap)
    }

    fn zone_of(&self, session_ts_s: f64, session_duration_s: f64) -> Zone {
        if session_ts_s < self.settings.zones.start_zone_duration_s {
            return Zone::Start;
        }
        if session_duration_s > 0.0
            && session_ts_s >= session_duration_s - self.settings.zones.end_zone_duration_s
        {
            return Zone::End;
        }
        Zone::Middle
    }
}
