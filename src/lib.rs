//! # Skogsnet
//!
//! Sensor telemetry logger: ingests periodic temperature/humidity readings
//! from a serial device, enriches them with ambient-weather samples, stores
//! both streams in SQLite, and serves a dashboard query API plus a CSV
//! export.
//!
//! ## Modules
//!
//! - [`storage`]: measurement store, correlation writer, aggregation
//!   queries, CSV export
//! - [`ingest`]: device transport and the ingestion loop
//! - [`weather`]: weather provider and the periodic refresher
//! - [`api`]: dashboard REST API (Axum)
//! - [`runtime`]: producer orchestration and shutdown
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use skogsnet::storage::{CorrelationWriter, Measurement, QueryEngine, Store};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Store::open("measurements.db")?;
//!
//!     let mut writer = CorrelationWriter::new(&store)?;
//!     writer.append_measurement(&Measurement::new(1_700_000_000_000, 22.5, 55.1))?;
//!
//!     let snapshot = QueryEngine::new(store).latest_with_trajectory()?;
//!     println!("latest: {:.1} degrees", snapshot.latest.avg_temperature);
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod runtime;
pub mod storage;
pub mod weather;

// Re-export top-level types for convenience
pub use storage::{
    export_csv, CorrelationWriter, LatestSnapshot, Measurement, QueryEngine, Range, SeriesPoint,
    Store, StoreError, StoreResult, WeatherSample, WEATHER_MATCH_WINDOW_MS,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError};

pub use ingest::{decode_reading, LineSource, TransportError, TtyLineSource};

pub use logging::LogGate;

pub use runtime::Orchestrator;

pub use weather::{OpenMeteoProvider, WeatherError, WeatherProvider};
