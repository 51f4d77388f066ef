//! CSV export
//!
//! One-shot snapshot dump of the joined data: fixed 11-column header, one
//! LF-terminated line per measurement, ordered ascending by timestamp.
//! Unmatched weather columns render as 0 (numeric) / "" (text). Weather
//! floats are truncated to one decimal, measurement floats rounded to one
//! decimal; the dashboard's historical exports did both and downstream
//! consumers have fixated on it.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::{Store, StoreResult};

const HEADER: &str = "timestamp,temperature,humidity,city,weather_temp,weather_humidity,\
wind_speed,wind_deg,clouds,weather_code,weather_description";

/// Write the full joined snapshot to `path`.
///
/// Any I/O error aborts the export as-is; a partially written file is left
/// behind for the operator to inspect.
pub fn export_csv(store: &Store, path: impl AsRef<Path>) -> StoreResult<()> {
    let conn = store.connect()?;
    let file = File::create(path.as_ref())?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{}", HEADER)?;

    let mut stmt = conn.prepare(
        "SELECT m.timestamp, m.temperature, m.humidity,
                w.city, w.temp, w.humidity, w.wind_speed, w.wind_deg,
                w.clouds, w.weather_code, w.description
         FROM measurements m
         LEFT JOIN weather w ON m.weather_id = w.id
         ORDER BY m.timestamp ASC",
    )?;

    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let timestamp: i64 = row.get(0)?;
        let temperature: f64 = row.get(1)?;
        let humidity: f64 = row.get(2)?;
        let city: Option<String> = row.get(3)?;
        let weather_temp: Option<f64> = row.get(4)?;
        let weather_humidity: Option<i64> = row.get(5)?;
        let wind_speed: Option<f64> = row.get(6)?;
        let wind_deg: Option<i64> = row.get(7)?;
        let clouds: Option<i64> = row.get(8)?;
        let weather_code: Option<i64> = row.get(9)?;
        let description: Option<String> = row.get(10)?;

        writeln!(
            out,
            "{},{:.1},{:.1},{},{:.1},{},{:.1},{},{},{},{}",
            timestamp,
            temperature,
            humidity,
            city.unwrap_or_default(),
            truncate_tenth(weather_temp.unwrap_or_default()),
            weather_humidity.unwrap_or_default(),
            truncate_tenth(wind_speed.unwrap_or_default()),
            wind_deg.unwrap_or_default(),
            clouds.unwrap_or_default(),
            weather_code.unwrap_or_default(),
            description.unwrap_or_default(),
        )?;
    }

    out.flush()?;
    Ok(())
}

/// Truncate toward zero to one decimal place.
fn truncate_tenth(x: f64) -> f64 {
    (x * 10.0) as i64 as f64 / 10.0
}
