//! Skogsnet daemon
//!
//! Run with: cargo run -- --city Helsinki
//!
//! Reads newline-delimited JSON from the serial device, stores
//! weather-correlated measurements in SQLite, and serves the dashboard API.
//! `--export-csv FILE` instead dumps the joined data and exits.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use skogsnet::api::AppState;
use skogsnet::config::Config;
use skogsnet::ingest::TtyLineSource;
use skogsnet::runtime::Orchestrator;
use skogsnet::storage::{export_csv, CorrelationWriter, QueryEngine, Store};
use skogsnet::weather::{refresher, OpenMeteoProvider};

#[derive(Parser)]
#[command(name = "skogsnet")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sensor telemetry logger with weather enrichment")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device node to read from
    #[arg(long)]
    device: Option<String>,

    /// SQLite database file
    #[arg(long)]
    db: Option<String>,

    /// City for weather enrichment
    #[arg(long)]
    city: Option<String>,

    /// Dashboard listen port
    #[arg(long)]
    port: Option<u16>,

    /// Disable the dashboard listener
    #[arg(long)]
    no_dashboard: bool,

    /// Disable weather enrichment
    #[arg(long)]
    no_weather: bool,

    /// Export measurements to a CSV file and exit
    #[arg(long, value_name = "FILE")]
    export_csv: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skogsnet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // One-shot export mode: open, dump, exit
    if let Some(path) = &cli.export_csv {
        let store = Store::open(&config.storage.db_path).context("failed to open store")?;
        export_csv(&store, path).context("export to CSV failed")?;
        tracing::info!("exported measurements to {}", path.display());
        return Ok(());
    }

    tracing::info!("skogsnet v{} starting", env!("CARGO_PKG_VERSION"));

    // Store-open failure is fatal
    let store = Store::open(&config.storage.db_path).context("failed to open store")?;

    let orch = Orchestrator::new();
    let (latest_tx, latest_rx) = refresher::latest_channel();

    if config.weather.enabled {
        anyhow::ensure!(
            !config.weather.city.is_empty(),
            "no city specified for weather enrichment (set --city or [weather].city)"
        );

        let provider = Arc::new(OpenMeteoProvider::new(Duration::from_millis(
            config.weather.request_timeout_ms,
        )));
        orch.spawn_refresher(
            provider,
            CorrelationWriter::new(&store)?,
            config.weather.city.clone(),
            Duration::from_secs(config.weather.fetch_interval_secs),
            latest_tx,
        );
    } else {
        tracing::info!("weather enrichment disabled");
    }

    let source = TtyLineSource::open(
        &config.device.path,
        Duration::from_millis(config.device.read_timeout_ms),
    )
    .await
    .with_context(|| format!("failed to open device {}", config.device.path))?;

    orch.spawn_ingestion(
        Box::new(source),
        CorrelationWriter::new(&store)?,
        latest_rx,
    );

    if config.dashboard.enabled {
        orch.spawn_dashboard(
            AppState::new(QueryEngine::new(store.clone())),
            config.dashboard.addr(),
        );
    } else {
        tracing::info!("dashboard listener disabled");
    }

    orch.run_until_signal().await;

    tracing::info!("skogsnet stopped");
    Ok(())
}

/// Config file (if any) with CLI flags layered on top.
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(device) = &cli.device {
        config.device.path = device.clone();
    }
    if let Some(db) = &cli.db {
        config.storage.db_path = db.clone();
    }
    if let Some(city) = &cli.city {
        config.weather.city = city.clone();
    }
    if let Some(port) = cli.port {
        config.dashboard.port = port;
    }
    if cli.no_dashboard {
        config.dashboard.enabled = false;
    }
    if cli.no_weather {
        config.weather.enabled = false;
    }

    Ok(config)
}
