//! Cross-camera partner matching.
//!
//! Samples join primarily on exact `moment_id` equality, which the shared
//! sampling grid guarantees for cameras observing the same grid point. A
//! fallback pass pairs leftovers within the partner time tolerance
//! (frame quantization at window boundaries can make one camera realize a
//! grid point the other missed). Moments with no partner stay in the
//! output as single-camera moments; one dead battery must not erase an
//! otherwise valid ride.

use std::collections::BTreeMap;

use tracing::debug;

use reel_models::{EnrichedMoment, Moment, SessionTime};

/// Group enriched samples into moments, pairing across cameras.
///
/// Output is ordered by `session_ts_s` ascending. The primary perspective
/// of a pair is the higher-scoring sample. The fallback pass is greedy
/// nearest-match without reuse: once a sample is claimed as a partner it
/// leaves the pool.
pub fn match_moments(
    enriched: Vec<EnrichedMoment>,
    session: SessionTime,
    partner_tolerance_s: f64,
) -> Vec<Moment> {
    let mut by_id: BTreeMap<i64, Vec<EnrichedMoment>> = BTreeMap::new();
    for moment in enriched {
        by_id.entry(moment.moment_id()).or_default().push(moment);
    }

    let mut moments: Vec<Moment> = Vec::new();
    let mut unpaired: Vec<EnrichedMoment> = Vec::new();

    for (_, mut group) in by_id {
        // Deterministic ordering inside a group: score desc, camera asc.
        group.sort_by(|a, b| {
            b.score_weighted
                .total_cmp(&a.score_weighted)
                .then_with(|| a.camera_id().cmp(b.camera_id()))
        });

        let primary = group.remove(0);
        let partner_idx = group
            .iter()
            .position(|m| m.camera_id() != primary.camera_id());

        match partner_idx {
            Some(idx) => {
                let partner = group.remove(idx);
                moments.push(pair(primary, Some(partner), session));
            }
            None => {
                // Same-camera duplicates (overlapping clips) collapse to
                // the best sample; the rest are discarded.
                unpaired.push(primary);
            }
        }
    }

    let fallback_pairs = fallback_match(&unpaired, session, partner_tolerance_s);
    let mut claimed = vec![false; unpaired.len()];
    for (i, j) in &fallback_pairs {
        claimed[*i] = true;
        claimed[*j] = true;
    }

    for (i, j) in fallback_pairs {
        let (a, b) = (unpaired[i].clone(), unpaired[j].clone());
        let (primary, partner) = if a.score_weighted >= b.score_weighted {
            (a, b)
        } else {
            (b, a)
        };
        moments.push(pair(primary, Some(partner), session));
    }

    for (idx, sample) in unpaired.into_iter().enumerate() {
        if !claimed[idx] {
            moments.push(pair(sample, None, session));
        }
    }

    moments.sort_by(|a, b| {
        a.session_ts_s
            .total_cmp(&b.session_ts_s)
            .then_with(|| a.moment_id.cmp(&b.moment_id))
    });

    debug!(
        moments = moments.len(),
        single_camera = moments.iter().filter(|m| m.is_single_camera()).count(),
        "Matched moments"
    );
    moments
}

/// Greedy nearest-match over still-unpaired samples: repeatedly claim the
/// globally closest cross-camera pair within tolerance.
fn fallback_match(
    unpaired: &[EnrichedMoment],
    session: SessionTime,
    tolerance_s: f64,
) -> Vec<(usize, usize)> {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for i in 0..unpaired.len() {
        for j in (i + 1)..unpaired.len() {
            if unpaired[i].camera_id() == unpaired[j].camera_id() {
                continue;
            }
            let delta = (session.session_ts(unpaired[i].abs_time_epoch())
                - session.session_ts(unpaired[j].abs_time_epoch()))
            .abs();
            if delta < tolerance_s {
                candidates.push((delta, i, j));
            }
        }
    }
    // Closest first; ties resolved by sample order for determinism.
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| (a.1, a.2).cmp(&(b.1, b.2))));

    let mut taken = vec![false; unpaired.len()];
    let mut pairs = Vec::new();
    for (_, i, j) in candidates {
        if taken[i] || taken[j] {
            continue;
        }
        taken[i] = true;
        taken[j] = true;
        pairs.push((i, j));
    }
    pairs
}

fn pair(primary: EnrichedMoment, partner: Option<EnrichedMoment>, session: SessionTime) -> Moment {
    // The earlier perspective's epoch is the canonical moment time.
    let epoch = match &partner {
        Some(p) => primary.abs_time_epoch().min(p.abs_time_epoch()),
        None => primary.abs_time_epoch(),
    };
    Moment {
        moment_id: primary.moment_id(),
        session_ts_s: session.session_ts(epoch),
        primary,
        partner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::{CameraId, SampledMoment};
    use std::path::PathBuf;

    const SESSION: SessionTime = SessionTime { start_epoch: 0.0 };

    fn enriched(camera: &str, epoch: f64, score: f64) -> EnrichedMoment {
        EnrichedMoment {
            sample: SampledMoment {
                moment_id: epoch.round() as i64,
                camera_id: CameraId::new(camera),
                abs_time_epoch: epoch,
                frame_index: 0,
                video_path: PathBuf::from(format!("/rides/{camera}_0001.MP4")),
            },
            detect_score: 0.5,
            bbox_area_frac: 0.1,
            scene_boost: 0.1,
            speed_kmh: Some(20.0),
            gradient_pct: None,
            score_weighted: score,
        }
    }

    #[test]
    fn test_identical_moment_id_always_matches() {
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 100.0, 0.6),
                enriched("Fly6Pro", 100.0, 0.4),
            ],
            SESSION,
            1.0,
        );

        assert_eq!(moments.len(), 1);
        assert!(!moments[0].is_single_camera());
        assert_eq!(moments[0].primary.camera_id().as_str(), "Fly12Sport");
    }

    #[test]
    fn test_primary_is_higher_scoring_perspective() {
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 100.0, 0.3),
                enriched("Fly6Pro", 100.0, 0.7),
            ],
            SESSION,
            1.0,
        );
        assert_eq!(moments[0].primary.camera_id().as_str(), "Fly6Pro");
        assert_eq!(moments[0].best_score(), 0.7);
    }

    #[test]
    fn test_fallback_within_tolerance_matches() {
        // Delta 0.5 < tolerance 1.0
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 125.3, 0.5),
                enriched("Fly6Pro", 125.8, 0.5),
            ],
            SESSION,
            1.0,
        );

        assert_eq!(moments.len(), 1);
        assert!(!moments[0].is_single_camera());
        assert_eq!(moments[0].session_ts_s, 125.3);
    }

    #[test]
    fn test_fallback_beyond_tolerance_stays_single() {
        // Delta 1.5 >= tolerance 1.0: both survive as single-camera.
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 125.3, 0.5),
                enriched("Fly6Pro", 126.8, 0.5),
            ],
            SESSION,
            1.0,
        );

        assert_eq!(moments.len(), 2);
        assert!(moments.iter().all(|m| m.is_single_camera()));
    }

    #[test]
    fn test_fallback_claims_closest_without_reuse() {
        // No two samples share a moment id. The rear sample pairs with
        // the closer front sample (delta 0.8); the other front sample is
        // beyond tolerance and stays single.
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 100.0, 0.5),
                enriched("Fly12Sport", 102.0, 0.5),
                enriched("Fly6Pro", 100.8, 0.5),
            ],
            SESSION,
            1.0,
        );

        let paired: Vec<&Moment> = moments.iter().filter(|m| !m.is_single_camera()).collect();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].session_ts_s, 100.0);
        assert_eq!(moments.iter().filter(|m| m.is_single_camera()).count(), 1);
    }

    #[test]
    fn test_output_ordered_by_session_ts() {
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 300.0, 0.5),
                enriched("Fly12Sport", 100.0, 0.5),
                enriched("Fly12Sport", 200.0, 0.5),
            ],
            SESSION,
            1.0,
        );
        let ts: Vec<f64> = moments.iter().map(|m| m.session_ts_s).collect();
        assert_eq!(ts, vec![100.0, 200.0, 300.0]);
    }

    #[test]
    fn test_single_camera_everywhere_is_fine() {
        let moments = match_moments(
            vec![
                enriched("Fly12Sport", 100.0, 0.5),
                enriched("Fly12Sport", 200.0, 0.5),
            ],
            SESSION,
            1.0,
        );
        assert_eq!(moments.len(), 2);
        assert!(moments.iter().all(|m| m.is_single_camera()));
    }
}
