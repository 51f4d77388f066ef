//! Measurement store
//!
//! Durable append-only storage for the two telemetry streams (measurements
//! and weather samples), backed by SQLite in write-ahead mode so the single
//! writer never blocks concurrent dashboard readers.
//!
//! The [`Store`] itself is a connection factory: every producer and every
//! query path opens its own [`rusqlite::Connection`]. Concurrent single-row
//! writers rely on SQLite's own locking (plus a busy timeout), not on an
//! external mutex.

pub mod export;
pub mod query;
pub mod types;
pub mod writer;

pub use export::export_csv;
pub use query::{QueryEngine, Range};
pub use types::{LatestSnapshot, Measurement, SeriesPoint, WeatherSample};
pub use writer::{CorrelationWriter, WEATHER_MATCH_WINDOW_MS};

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store could not be opened or its schema created. Fatal to the process.
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Write-ahead mode could not be enabled or verified.
    #[error("write-ahead mode verification failed, journal_mode={0}")]
    WalMode(String),

    /// A query matched no rows where at least one was required.
    #[error("no measurements recorded")]
    Empty,

    /// Any other SQLite failure (insert, scan, prepare).
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File I/O failure (CSV export).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

const CREATE_MEASUREMENTS: &str = "
    CREATE TABLE IF NOT EXISTS measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        weather_id INTEGER,
        timestamp INTEGER,
        temperature REAL,
        humidity REAL
    )";

const CREATE_WEATHER: &str = "
    CREATE TABLE IF NOT EXISTS weather (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp INTEGER,
        city TEXT,
        temp REAL,
        humidity INTEGER,
        wind_speed REAL,
        wind_deg INTEGER,
        clouds INTEGER,
        weather_code INTEGER,
        description TEXT
    )";

/// Handle to the on-disk database.
///
/// Cheap to clone; holds only the path. Each component opens its own
/// connection via [`Store::connect`].
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (or create) the database, create the schema, and switch the
    /// journal to write-ahead mode.
    ///
    /// WAL mode is verified by reading the pragma back; a store that cannot
    /// reach WAL mode is unusable for the reader/writer concurrency this
    /// system needs, so the failure is surfaced to the caller (and treated
    /// as fatal by the binary).
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let conn = Connection::open(&path).map_err(|e| StoreError::Open {
            path: path.display().to_string(),
            source: e,
        })?;

        conn.execute(CREATE_MEASUREMENTS, [])?;
        conn.execute(CREATE_WEATHER, [])?;

        // journal_mode is persistent; enabling it once on open covers every
        // later connection to the same file.
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get(0)
        })?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(StoreError::WalMode(mode));
        }

        tracing::info!(path = %path.display(), "store opened, write-ahead mode enabled");

        Ok(Self { path })
    }

    /// Open a new connection for one producer or query path.
    pub fn connect(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        Ok(conn)
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
