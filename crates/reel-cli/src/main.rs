//! RideReel pipeline runner.

mod providers;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_media::FfprobeMediaProbe;
use reel_models::ReelConfig;
use reel_pipeline::{
    cancel_pair, Action, ArtifactId, FsArtifactStore, PipelineContext, PipelineExecutor,
    ProjectPaths,
};

use crate::providers::{SidecarDetection, SidecarScene};

#[derive(Parser)]
#[command(name = "reel", version, about = "Dual-camera ride highlight pipeline")]
struct Cli {
    /// Project directory (GPX, recordings, working artifacts)
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Configuration file; defaults to <project>/reel.json when present
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the telemetry timeline, align cameras, realize the grid
    Prepare,
    /// Enrich and score sampled moments
    Analyze,
    /// Match perspectives and select highlight moments
    Select,
    /// Produce the render plan for the external encoder
    Build,
    /// Run the whole pipeline
    Run {
        /// Recompute every stage even when fresh artifacts exist
        #[arg(long)]
        fresh: bool,
    },
    /// Show artifact status for the project
    Status,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<ReelConfig> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.project.join("reel.json"));
    if path.exists() {
        info!(config = %path.display(), "Loading configuration");
        ReelConfig::load(&path).with_context(|| format!("loading {}", path.display()))
    } else {
        info!("No configuration file, using defaults");
        Ok(ReelConfig::default())
    }
}

fn build_executor(cli: &Cli, config: ReelConfig) -> anyhow::Result<PipelineExecutor> {
    let project = &cli.project;
    let paths = ProjectPaths {
        gpx_file: project.join("ride.gpx"),
        videos_dir: project.clone(),
    };

    let detection = SidecarDetection::load(project.join("detections.json"))
        .context("loading detection sidecar")?;
    let scene = SidecarScene::load(project.join("scene_scores.json"))
        .context("loading scene-change sidecar")?;

    let (cancel_handle, cancel_token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing the current item then stopping");
            cancel_handle.cancel();
        }
    });

    let ctx = PipelineContext::new(
        config,
        paths,
        Arc::new(FsArtifactStore::new(project.join("working"))),
        Arc::new(FfprobeMediaProbe),
        Arc::new(detection),
        Arc::new(scene),
        cancel_token,
    );
    Ok(PipelineExecutor::new(ctx)?)
}

fn print_status(executor: &PipelineExecutor) {
    let store = &executor.context().store;
    for stage in reel_pipeline::StageName::all() {
        let produced: Vec<String> = stage
            .produces()
            .iter()
            .map(|&artifact| {
                let mark = if store.exists(artifact) { "✓" } else { "✗" };
                format!("{mark} {artifact}")
            })
            .collect();
        println!("{:10} {}", stage.as_str(), produced.join("  "));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let mut executor = build_executor(&cli, config)?;

    match cli.command {
        Command::Prepare => executor.run_action(Action::Prepare).await?,
        Command::Analyze => executor.run_action(Action::Analyze).await?,
        Command::Select => executor.run_action(Action::Select).await?,
        Command::Build => executor.run_action(Action::Build).await?,
        Command::Run { fresh } => executor.run_all(!fresh).await?,
        Command::Status => {
            print_status(&executor);
            return Ok(());
        }
    }

    let report = executor.context().report_snapshot();
    info!("Run report: {}", report.summary());
    if executor.context().store.exists(ArtifactId::Report) {
        info!("Full report persisted to working/report.json");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    run(cli).await
}
