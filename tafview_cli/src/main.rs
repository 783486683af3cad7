//! tafview CLI
//!
//! Replay recorded traffic scenarios in the terminal or headless.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tafview_cli::{load_agents, load_map, run_headless, scenario_bounds, ColumnMap, GeoPoint, TerminalApp};
use tafview_core::{
    DisplayOptions, FrameIndex, PlaybackConfig, Player, RecordingCanvas, ReplayError, RunOutcome,
    ViewConfig, Viewer,
};
use tafview_env::{ReplayContext, SimContext, TokioContext};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// tafview traffic scenario player
#[derive(Parser, Debug)]
#[command(name = "tafview")]
#[command(about = "Replay recorded traffic scenarios", long_about = None)]
struct Args {
    /// Agent CSV file
    data: PathBuf,

    /// GeoJSON road map (LineString features); requires --origin
    #[arg(short, long)]
    map: Option<PathBuf>,

    /// Geographic origin of the local coordinates, as "lat,lon"
    #[arg(short, long)]
    origin: Option<GeoPoint>,

    /// Only play rows of this case
    #[arg(short, long)]
    case_id: Option<i64>,

    /// JSON file overriding CSV column names
    #[arg(long)]
    columns: Option<PathBuf>,

    /// Padding around the data, as a fraction of each axis range
    #[arg(long, default_value = "0.05")]
    margin: f64,

    /// Playback speed factor
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Canvas height in pixels (width follows the data aspect ratio)
    #[arg(long, default_value = "600")]
    height: f64,

    /// Draw heading arrows
    #[arg(long)]
    orientation: bool,

    /// Draw track id labels
    #[arg(long)]
    labels: bool,

    /// Run without the terminal UI
    #[arg(long)]
    headless: bool,

    /// With --headless: use a virtual clock instead of waiting in real time
    #[arg(long, requires = "headless")]
    no_wait: bool,

    /// Write logs to this file (the terminal UI otherwise suppresses them)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(args: &Args) -> Result<()> {
    let default = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = FmtSubscriber::builder().with_env_filter(filter);

    let result = match (&args.log_file, args.headless) {
        (Some(path), _) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            tracing::subscriber::set_global_default(
                builder.with_ansi(false).with_writer(Arc::new(file)).finish(),
            )
        }
        (None, true) => tracing::subscriber::set_global_default(builder.finish()),
        (None, false) => {
            tracing::subscriber::set_global_default(builder.with_writer(std::io::sink).finish())
        }
    };
    result.context("failed to set tracing subscriber")
}

fn build_player<Ctx: ReplayContext>(args: &Args, ctx: Arc<Ctx>) -> Result<Player<Ctx, RecordingCanvas>> {
    if args.map.is_some() && args.origin.is_none() {
        bail!("--map needs --origin to place the agent coordinates");
    }

    let columns = match &args.columns {
        Some(path) => ColumnMap::from_json_file(path)?,
        None => ColumnMap::default(),
    };
    let agents = load_agents(&args.data, &columns, args.origin, args.case_id)?;
    let map = args.map.as_ref().map(load_map).transpose()?;
    let bounds = scenario_bounds(&agents, map.as_deref(), args.margin)?;

    let frames = FrameIndex::build(agents);
    if frames.is_empty() {
        return Err(ReplayError::EmptyScenario.into());
    }

    let options = DisplayOptions {
        show_orientation: args.orientation,
        show_labels: args.labels,
    };
    let mut viewer = Viewer::new(RecordingCanvas::new(args.height, args.height), ViewConfig::default())
        .with_options(options);
    viewer.set_bounds(bounds);
    let width = viewer.resize_to_aspect();
    info!(width, height = args.height, ?bounds, "canvas fitted");

    let player = Player::new(ctx, viewer, PlaybackConfig::default());
    player.set_speed(args.speed)?;
    player.load(frames, map)?;
    Ok(player)
}

async fn headless<Ctx: ReplayContext>(args: &Args, ctx: Arc<Ctx>) -> Result<()> {
    let player = build_player(args, ctx.clone())?;
    let summary = run_headless(&*ctx, &player).await;
    if summary.outcome != RunOutcome::Completed {
        bail!("playback did not complete: {:?}", summary.outcome);
    }
    Ok(())
}

async fn interactive(args: &Args) -> Result<()> {
    let player = build_player(args, TokioContext::shared())?;
    let app = TerminalApp::new(player, tokio::runtime::Handle::current());
    tokio::task::spawn_blocking(move || app.run())
        .await
        .context("terminal task panicked")?
        .context("terminal error")
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    info!("tafview v{}", env!("CARGO_PKG_VERSION"));

    let result = match (args.headless, args.no_wait) {
        (true, true) => headless(&args, SimContext::shared()).await,
        (true, false) => headless(&args, TokioContext::shared()).await,
        (false, _) => interactive(&args).await,
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
