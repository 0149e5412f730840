// Gaffer entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; stdout carries the report)
// 2. Load config
// 3. Load the snapshot (JSON file or SQLite data store)
// 4. Overlay projections, if any
// 5. Run the advisor and print the JSON report

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gaffer::config;
use gaffer::db;
use gaffer::loader;
use gaffer::projections;
use gaffer::run;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gaffer")]
#[command(about = "Transfer, captaincy and chip advice for a fantasy squad")]
struct Args {
    /// JSON snapshot file to read instead of the database
    #[arg(long, conflicts_with = "db")]
    snapshot: Option<PathBuf>,

    /// SQLite data store (defaults to data.db_path from strategy.toml)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Gameweek to plan for (inferred from the data when omitted)
    #[arg(long)]
    gameweek: Option<u32>,

    /// CSV of expected points by athlete id
    #[arg(long)]
    projections: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1. Initialize tracing
    init_tracing()?;
    info!("Gaffer starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: league={}, budget {:.1}, squad of {}",
        config.league.name, config.league.budget, config.league.squad_size
    );

    // 3. Load the snapshot
    let snapshot_path = args
        .snapshot
        .or_else(|| config.data.snapshot_path.as_ref().map(PathBuf::from));
    let mut data = match (snapshot_path, args.db) {
        (Some(path), None) => {
            info!("Reading snapshot from {}", path.display());
            loader::from_json_file(&path)?
        }
        (_, db_path) => {
            let path = db_path.unwrap_or_else(|| PathBuf::from(&config.data.db_path));
            info!("Reading data store at {}", path.display());
            let db = db::Database::open_read_only(&path.to_string_lossy())?;
            loader::from_database(&db)?
        }
    };

    // 4. Overlay projections
    let projections_path = args
        .projections
        .or_else(|| config.data.projections_path.as_ref().map(PathBuf::from));
    if let Some(path) = projections_path {
        let projections = projections::load_projections(&path)
            .context("failed to load projections")?;
        let applied = data.apply_projections(&projections);
        info!("Applied {} projections from {}", applied, path.display());
    }

    let loaded = data
        .freeze(args.gameweek)
        .context("failed to build snapshot")?;

    // 5. Advise and report
    let report = run::advise(&config, loaded).await?;
    println!("{}", report.to_json().context("failed to serialize report")?);

    info!("Gaffer finished");
    Ok(())
}

/// Initialize tracing to log to a file (stdout is reserved for the report).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("gaffer.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gaffer=info,gaffer_core=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
