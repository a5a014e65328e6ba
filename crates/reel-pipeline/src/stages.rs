//! Stage bodies.
//!
//! Each stage reads its required artifacts, does its work (fanning out
//! per-item where items are independent), and writes its produced
//! artifacts exactly once, in deterministic order. Nothing here retries;
//! transient collaborator failures degrade per-record and land in the run
//! report.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use tracing::{info, warn};

use reel_engine::{
    apply_dual_camera_bonus, match_moments, realize_recording, sampling_grid, Enricher, Selector,
};
use reel_media::{parse_camera_and_clip, CameraRecording, OffsetResolver, SessionAlignment};
use reel_models::{
    AlignmentWarning, CameraId, ClipTime, EnrichedMoment, GapKind, SampledMoment, SessionTime,
    TelemetryPoint,
};
use reel_telemetry::{build_timeline, parse_gpx, ride_stats, TelemetryIndex, TimelineOptions};

use crate::artifact::{from_csv, read_json, to_csv, write_json, ArtifactId};
use crate::context::PipelineContext;
use crate::error::{PipelineError, PipelineResult};
use crate::pool::{run_batch, ResourceClass};
use crate::rows::{
    EnrichedRow, FrameRow, RenderClip, RenderPlanDoc, RenderSource, SelectionRow, SessionDoc,
};
use crate::stage::StageName;

/// Dispatch a stage body.
pub(crate) async fn run(ctx: &PipelineContext, stage: StageName) -> PipelineResult<()> {
    match stage {
        StageName::Timeline => timeline(ctx).await,
        StageName::Align => align(ctx).await,
        StageName::Sample => sample(ctx).await,
        StageName::Enrich => enrich(ctx).await,
        StageName::Select => select(ctx).await,
        StageName::Build => build(ctx).await,
    }
}

/// GPX -> 1 Hz telemetry table. The timeline anchors everything after it,
/// so an empty or untimed track fails here with a clear error instead of
/// limping into the grid stage.
async fn timeline(ctx: &PipelineContext) -> PipelineResult<()> {
    let gpx_path = &ctx.paths.gpx_file;
    if !gpx_path.exists() {
        return Err(PipelineError::MissingInput(gpx_path.clone()));
    }

    let raw = std::fs::read_to_string(gpx_path)?;
    let points = parse_gpx(&raw)?;
    let rows = build_timeline(
        &points,
        TimelineOptions {
            resample_interval_s: 1.0,
            gpx_time_offset_s: ctx.config.alignment.gpx_time_offset_s,
        },
    );
    if rows.is_empty() {
        return Err(PipelineError::NoGridAnchor);
    }

    ctx.with_report(|r| r.ride = Some(ride_stats(&rows)));
    ctx.store.write(ArtifactId::Telemetry, &to_csv(&rows)?)?;
    Ok(())
}

/// Probe every recording and resolve true start epochs. Offsets actually
/// used are persisted as the camera-offsets artifact; a calibration tool
/// may correct that file, and the corrected values supersede the built-in
/// table on the next run.
async fn align(ctx: &PipelineContext) -> PipelineResult<()> {
    let videos = scan_videos(ctx)?;
    if videos.is_empty() {
        return Err(PipelineError::NoRecordings);
    }

    let calibration: Option<HashMap<String, f64>> = if ctx.store.exists(ArtifactId::CameraOffsets)
    {
        Some(read_json(ctx.store.as_ref(), ArtifactId::CameraOffsets)?)
    } else {
        None
    };
    let resolver = OffsetResolver::new(&ctx.config.alignment, calibration);

    // Probing is externally bound; pool conservatively.
    let class = ResourceClass::External(ctx.config.workers.external_parallelism);
    let outcome = run_batch(videos, class, &ctx.cancel, |_, (camera, clip, path)| {
        let probe = ctx.probe.clone();
        async move {
            match probe.probe(&path).await {
                Ok(probed) => Some((camera, clip, path, probed)),
                Err(e) => {
                    ctx.with_report(|r| {
                        r.record_warning(AlignmentWarning::ProbeFailed {
                            video_path: path.clone(),
                            reason: e.to_string(),
                        })
                    });
                    None
                }
            }
        }
    })
    .await;
    if outcome.cancelled {
        return Err(PipelineError::Cancelled {
            stage: StageName::Align,
        });
    }

    let mut recordings = Vec::new();
    let mut warnings = Vec::new();
    let mut unknown_cameras: BTreeSet<CameraId> = BTreeSet::new();
    for (camera, clip_num, path, probed) in outcome.into_completed() {
        let resolved = resolver.resolve(&camera, probed.raw_creation_time, probed.duration_s);
        if resolved.unknown_model && unknown_cameras.insert(camera.clone()) {
            warnings.push(AlignmentWarning::UnknownCameraModel {
                camera_id: camera.clone(),
            });
        }
        recordings.push(CameraRecording::new(
            camera, path, clip_num, &probed, &resolved,
        ));
    }

    let alignment =
        SessionAlignment::build(recordings, warnings).ok_or(PipelineError::NoRecordings)?;
    ctx.with_report(|r| r.record_warnings(alignment.warnings.clone()));

    let offsets_used: BTreeMap<String, f64> = alignment
        .cameras()
        .into_iter()
        .map(|camera| {
            let offset = resolver.registry().model_offset(&camera).unwrap_or(0.0);
            (camera.as_str().to_string(), offset)
        })
        .collect();
    write_json(ctx.store.as_ref(), ArtifactId::CameraOffsets, &offsets_used)?;
    write_json(
        ctx.store.as_ref(),
        ArtifactId::Session,
        &SessionDoc {
            session_start_epoch: alignment.session.start_epoch,
            recordings: alignment.recordings,
        },
    )?;
    Ok(())
}

/// Generate the GPS-anchored grid and realize frame metadata for every
/// recording window.
async fn sample(ctx: &PipelineContext) -> PipelineResult<()> {
    let telemetry: Vec<TelemetryPoint> = from_csv(&ctx.store.read(ArtifactId::Telemetry)?)?;
    let (Some(first), Some(last)) = (telemetry.first(), telemetry.last()) else {
        return Err(PipelineError::NoGridAnchor);
    };
    let session: SessionDoc = read_json(ctx.store.as_ref(), ArtifactId::Session)?;

    let grid = sampling_grid(
        first.epoch,
        last.epoch,
        ctx.config.alignment.sample_interval_s,
    );

    let mut samples: Vec<SampledMoment> = Vec::new();
    for recording in &session.recordings {
        let (realized, warning) = realize_recording(recording, &grid, first.epoch);
        if let Some(warning) = warning {
            ctx.with_report(|r| r.record_warning(warning));
        }
        samples.extend(realized);
    }

    if samples.is_empty() {
        warn!("No grid points landed inside any recording window");
    }

    samples.sort_by(|a, b| {
        (a.moment_id, a.camera_id.as_str()).cmp(&(b.moment_id, b.camera_id.as_str()))
    });
    let rows: Vec<FrameRow> = samples.iter().map(FrameRow::from).collect();
    ctx.store.write(ArtifactId::Frames, &to_csv(&rows)?)?;

    info!(
        grid_points = grid.len(),
        samples = rows.len(),
        "Sampling grid realized"
    );
    Ok(())
}

/// Fan enrichment out over the sampled moments. Telemetry gaps degrade
/// individual records; capability failures (detection, scene) count
/// toward the batch tolerance, and only exceeding that aborts the stage.
async fn enrich(ctx: &PipelineContext) -> PipelineResult<()> {
    let frames: Vec<FrameRow> = from_csv(&ctx.store.read(ArtifactId::Frames)?)?;
    let telemetry =
        TelemetryIndex::new(from_csv(&ctx.store.read(ArtifactId::Telemetry)?)?);
    let enricher = Enricher::new(&ctx.config);

    let samples: Vec<SampledMoment> = frames.into_iter().map(Into::into).collect();
    let total = samples.len();

    let class = ResourceClass::External(ctx.config.workers.external_parallelism);
    let outcome = run_batch(samples, class, &ctx.cancel, |_, sample| {
        let enricher = &enricher;
        let telemetry = &telemetry;
        async move {
            Some(
                enricher
                    .enrich(
                        sample,
                        telemetry,
                        ctx.detection.as_ref(),
                        ctx.scene.as_ref(),
                    )
                    .await,
            )
        }
    })
    .await;
    if outcome.cancelled {
        return Err(PipelineError::Cancelled {
            stage: StageName::Enrich,
        });
    }

    let outcomes = outcome.into_completed();

    // Capability failures are batch failures; telemetry gaps are data
    // gaps and never abort.
    let capability_failures = outcomes
        .iter()
        .filter(|o| {
            o.gaps
                .iter()
                .any(|g| matches!(g.kind, GapKind::Detection | GapKind::SceneChange))
        })
        .count();
    let degraded = outcomes.iter().filter(|o| !o.gaps.is_empty()).count();
    if total > 0 {
        let failure_fraction = capability_failures as f64 / total as f64;
        if failure_fraction > ctx.config.workers.max_missing_fraction {
            return Err(PipelineError::TooManyGaps {
                affected: capability_failures,
                total,
            });
        }
        ctx.with_report(|r| r.degraded_fraction = degraded as f64 / total as f64);
    }

    let mut enriched: Vec<EnrichedMoment> = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        ctx.with_report(|r| r.record_gaps(outcome.gaps.clone()));
        enriched.push(outcome.moment);
    }
    enriched.sort_by(|a, b| {
        (a.moment_id(), a.camera_id().as_str()).cmp(&(b.moment_id(), b.camera_id().as_str()))
    });

    let rows: Vec<EnrichedRow> = enriched.iter().map(EnrichedRow::from).collect();
    ctx.store.write(ArtifactId::Enriched, &to_csv(&rows)?)?;

    info!(moments = rows.len(), degraded, "Enrichment complete");
    Ok(())
}

/// Match perspectives into moments, apply the dual-camera bonus, and run
/// the selector. An empty selection is a valid terminal state; its
/// diagnostic breakdown goes to the run report either way.
async fn select(ctx: &PipelineContext) -> PipelineResult<()> {
    let rows: Vec<EnrichedRow> = from_csv(&ctx.store.read(ArtifactId::Enriched)?)?;
    let session: SessionDoc = read_json(ctx.store.as_ref(), ArtifactId::Session)?;
    let telemetry: Vec<TelemetryPoint> = from_csv(&ctx.store.read(ArtifactId::Telemetry)?)?;

    let session_time = SessionTime {
        start_epoch: session.session_start_epoch,
    };
    let enriched: Vec<EnrichedMoment> = rows.into_iter().map(Into::into).collect();

    let mut moments = match_moments(
        enriched,
        session_time,
        ctx.config.alignment.partner_tolerance_s,
    );
    apply_dual_camera_bonus(&mut moments, ctx.config.scoring.dual_camera_bonus);

    let session_duration_s = telemetry
        .last()
        .map(|p| (p.epoch - session_time.start_epoch).max(0.0))
        .unwrap_or(0.0);

    let result =
        Selector::new(ctx.config.selection.clone()).select(&moments, session_duration_s);
    ctx.with_report(|r| r.selection = Some(result.diagnostics));

    let mut selection_rows: Vec<SelectionRow> = Vec::new();
    for clip in &result.clips {
        let moment = &clip.moment;
        selection_rows.push(SelectionRow::from_enriched(
            &moment.primary,
            moment.partner.as_ref().map(|p| p.moment_id()),
            true,
        ));
        if let Some(partner) = &moment.partner {
            selection_rows.push(SelectionRow::from_enriched(
                partner,
                Some(moment.primary.moment_id()),
                false,
            ));
        }
    }
    selection_rows.sort_by(|a, b| {
        a.abs_time_epoch
            .total_cmp(&b.abs_time_epoch)
            .then_with(|| a.camera_id.cmp(&b.camera_id))
    });
    ctx.store
        .write(ArtifactId::Selection, &to_csv(&selection_rows)?)?;
    Ok(())
}

/// Turn the selection table into the render plan the external encoder
/// consumes. The table's `recommended` flags are honored as-is, so a
/// manual review pass over the file carries straight through.
async fn build(ctx: &PipelineContext) -> PipelineResult<()> {
    let rows: Vec<SelectionRow> = from_csv(&ctx.store.read(ArtifactId::Selection)?)?;
    let session: SessionDoc = read_json(ctx.store.as_ref(), ArtifactId::Session)?;
    let session_time = SessionTime {
        start_epoch: session.session_start_epoch,
    };

    let mut by_moment: BTreeMap<i64, Vec<SelectionRow>> = BTreeMap::new();
    for row in rows {
        by_moment.entry(row.moment_id).or_default().push(row);
    }

    let pre_roll_s = ctx.config.selection.pre_roll_s;
    let clip_length_s = ctx.config.selection.clip_len_s;

    let mut clips = Vec::new();
    for (moment_id, group) in by_moment {
        let Some(primary) = group.iter().find(|r| r.recommended) else {
            continue; // deselected during manual review
        };
        let partner = group.iter().find(|r| !r.recommended);

        let Some(primary_source) = render_source(&session.recordings, primary, pre_roll_s)
        else {
            warn!(moment_id, "No recording window covers the selected moment");
            continue;
        };

        clips.push(RenderClip {
            moment_id,
            session_ts_s: session_time.session_ts(primary.abs_time_epoch),
            pre_roll_s,
            clip_length_s,
            primary: primary_source,
            partner: partner.and_then(|row| render_source(&session.recordings, row, pre_roll_s)),
        });
    }
    clips.sort_by(|a, b| a.session_ts_s.total_cmp(&b.session_ts_s));

    info!(clips = clips.len(), "Render plan ready");
    write_json(
        ctx.store.as_ref(),
        ArtifactId::RenderPlan,
        &RenderPlanDoc { clips },
    )?;
    Ok(())
}

/// Locate a selection row's source recording and compute its seek.
fn render_source(
    recordings: &[CameraRecording],
    row: &SelectionRow,
    pre_roll_s: f64,
) -> Option<RenderSource> {
    let recording = recordings.iter().find(|r| {
        r.video_path == PathBuf::from(&row.video_path) && r.contains(row.abs_time_epoch)
    })?;
    let clip_time = ClipTime {
        abs_time_epoch: row.abs_time_epoch,
        clip_start_epoch: recording.derived_start_epoch,
        duration_s: recording.duration_s,
    };
    Some(RenderSource {
        camera_id: row.camera_id.clone(),
        video_path: row.video_path.clone(),
        seek_start_s: clip_time.seek_start(pre_roll_s),
    })
}

/// Scan the videos directory for `<Camera>_<clip>.MP4` recordings, in
/// deterministic (file name) order. Files that do not fit the naming
/// scheme are skipped with a warning.
fn scan_videos(ctx: &PipelineContext) -> PipelineResult<Vec<(CameraId, u32, PathBuf)>> {
    let dir = &ctx.paths.videos_dir;
    if !dir.is_dir() {
        return Err(PipelineError::MissingInput(dir.clone()));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("mp4"))
        })
        .collect();
    paths.sort();

    let mut videos = Vec::new();
    for path in paths {
        match parse_camera_and_clip(&path) {
            Ok((camera, clip_num)) => videos.push((camera, clip_num, path)),
            Err(e) => {
                warn!(video = %path.display(), "Skipping unrecognized video file");
                ctx.with_report(|r| {
                    r.record_warning(AlignmentWarning::ProbeFailed {
                        video_path: path,
                        reason: e.to_string(),
                    })
                });
            }
        }
    }
    Ok(videos)
}
