//! Correlation writer
//!
//! Single writer for both telemetry streams. Each new measurement is linked,
//! eagerly at insert time, to the nearest weather sample inside the match
//! window. The link is never recomputed when a closer sample arrives later -
//! that staleness is documented behavior, and the lookup-then-insert pair is
//! intentionally not atomic against concurrent weather inserts (eventual
//! consistency is enough for a 10-minute window).

use rusqlite::{params, Connection, OptionalExtension};

use super::types::{Measurement, WeatherSample};
use super::{Store, StoreResult};

/// Maximum |measurement.timestamp - weather.timestamp| for a link, in ms.
pub const WEATHER_MATCH_WINDOW_MS: i64 = 600_000;

/// Appends measurements (weather-linked) and weather samples to the store.
pub struct CorrelationWriter {
    conn: Connection,
}

impl CorrelationWriter {
    /// Open a writer connection against the store.
    pub fn new(store: &Store) -> StoreResult<Self> {
        Ok(Self {
            conn: store.connect()?,
        })
    }

    /// Append one measurement, linked to the closest weather sample within
    /// the match window (or unlinked if none qualifies). Returns the
    /// store-assigned row id.
    pub fn append_measurement(&mut self, m: &Measurement) -> StoreResult<i64> {
        let weather_id = self.nearest_weather(m.timestamp)?;

        self.conn.execute(
            "INSERT INTO measurements (timestamp, temperature, humidity, weather_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                m.timestamp,
                m.temperature_celsius,
                m.humidity_percent,
                weather_id
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Append one weather sample, timestamped at fetch time by the caller.
    /// Returns the store-assigned row id.
    pub fn append_weather(&mut self, timestamp: i64, sample: &WeatherSample) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO weather
               (timestamp, city, temp, humidity, wind_speed, wind_deg, clouds, weather_code, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                timestamp,
                sample.city,
                sample.temp_celsius,
                sample.humidity,
                sample.wind_speed,
                sample.wind_deg,
                sample.clouds,
                sample.weather_code,
                sample.description
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// Id of the weather sample minimizing |timestamp - t|, strictly inside
    /// the match window; `None` when no sample qualifies.
    fn nearest_weather(&self, timestamp: i64) -> StoreResult<Option<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id FROM weather
             WHERE ABS(timestamp - ?1) < ?2
             ORDER BY ABS(timestamp - ?1) ASC
             LIMIT 1",
        )?;

        let id = stmt
            .query_row(params![timestamp, WEATHER_MATCH_WINDOW_MS], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(id)
    }
}
