//! Aggregation query engine
//!
//! Read side of the store: the dashboard's "latest + trend" snapshot and the
//! range/bucketed time series. All bucketing goes through one SQL strategy -
//! bucket start = `(timestamp_ms / 1000 / width) * width * 1000` - with the
//! per-range variation confined to the `since` boundary and the bucket
//! width. Numeric weather fields average; text fields take the SQL `MAX`
//! representative (arbitrary but deterministic, and part of the dashboard's
//! observed behavior).

use chrono::{DateTime, Duration, Local, Months, NaiveTime, TimeZone};
use rusqlite::{params, Row};

use super::types::{LatestSnapshot, SeriesPoint};
use super::{Store, StoreError, StoreResult};

/// How many recent measurements feed the trajectory computation.
pub const TRAJECTORY_WINDOW: usize = 10;

/// Dashboard time ranges.
///
/// All ranges are rolling windows anchored at "now" except `Today`, which
/// starts at local midnight of the current day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Range {
    OneHour,
    SixHours,
    TwelveHours,
    Day,
    Today,
    Week,
    Month,
    Year,
    /// Everything since the epoch; also the fallback for unknown inputs.
    All,
}

impl Range {
    /// Parse a `range` query parameter. Unrecognized values (including the
    /// empty string) fall back to all-time, matching the dashboard contract.
    pub fn parse(s: &str) -> Self {
        match s {
            "1h" => Range::OneHour,
            "6h" => Range::SixHours,
            "12h" => Range::TwelveHours,
            "24h" => Range::Day,
            "today" => Range::Today,
            "week" => Range::Week,
            "month" => Range::Month,
            "year" => Range::Year,
            _ => Range::All,
        }
    }

    /// Lower bound (epoch ms, inclusive) of the range, anchored at `now`.
    pub fn since<Tz: TimeZone>(&self, now: DateTime<Tz>) -> i64 {
        match self {
            Range::OneHour => (now - Duration::hours(1)).timestamp_millis(),
            Range::SixHours => (now - Duration::hours(6)).timestamp_millis(),
            Range::TwelveHours => (now - Duration::hours(12)).timestamp_millis(),
            Range::Day => (now - Duration::hours(24)).timestamp_millis(),
            Range::Today => {
                let midnight = now.date_naive().and_time(NaiveTime::MIN);
                now.timezone()
                    .from_local_datetime(&midnight)
                    .earliest()
                    .map(|dt| dt.timestamp_millis())
                    .unwrap_or_else(|| now.timestamp_millis())
            }
            Range::Week => (now - Duration::days(7)).timestamp_millis(),
            Range::Month => now
                .checked_sub_months(Months::new(1))
                .map(|dt| dt.timestamp_millis())
                .unwrap_or(0),
            Range::Year => now
                .checked_sub_months(Months::new(12))
                .map(|dt| dt.timestamp_millis())
                .unwrap_or(0),
            Range::All => 0,
        }
    }

    /// Bucket width in seconds for this range.
    pub fn bucket_width_secs(&self) -> i64 {
        match self {
            Range::OneHour | Range::SixHours | Range::TwelveHours | Range::Day | Range::Today => 60,
            Range::Week => 3600,
            Range::Month | Range::Year | Range::All => 86_400,
        }
    }
}

/// Read-side engine over the store.
///
/// Opens a fresh connection per query so concurrent dashboard requests never
/// serialize behind each other or behind the writer.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Store,
}

impl QueryEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The `TRAJECTORY_WINDOW` most recent measurements joined to weather,
    /// reduced to the newest row plus the temperature delta across the
    /// window (newest minus oldest). Fails with [`StoreError::Empty`] when
    /// the store holds no measurements.
    pub fn latest_with_trajectory(&self) -> StoreResult<LatestSnapshot> {
        let conn = self.store.connect()?;

        let mut stmt = conn.prepare_cached(
            "SELECT m.timestamp, m.temperature, m.humidity,
                    w.city, w.temp, w.humidity, w.wind_speed, w.wind_deg,
                    w.clouds, w.weather_code, w.description
             FROM measurements m
             LEFT JOIN weather w ON m.weather_id = w.id
             ORDER BY m.timestamp DESC
             LIMIT ?1",
        )?;

        let rows: Vec<SeriesPoint> = stmt
            .query_map(params![TRAJECTORY_WINDOW as i64], row_to_point)?
            .collect::<Result<_, _>>()?;

        let latest = rows.first().cloned().ok_or(StoreError::Empty)?;

        let trajectory = if rows.len() >= 2 {
            Some(latest.avg_temperature - rows[rows.len() - 1].avg_temperature)
        } else {
            None
        };

        Ok(LatestSnapshot { latest, trajectory })
    }

    /// Bucketed series for the given range, anchored at the wall clock.
    pub fn ranged_series(&self, range: Range) -> StoreResult<Vec<SeriesPoint>> {
        self.ranged_series_at(range, Local::now())
    }

    /// Bucketed series anchored at an explicit "now" (captured once per
    /// call; injected for tests).
    ///
    /// Buckets are emitted only when they contain at least one measurement -
    /// no gap-filling - and come back ordered ascending by bucket start.
    pub fn ranged_series_at<Tz: TimeZone>(
        &self,
        range: Range,
        now: DateTime<Tz>,
    ) -> StoreResult<Vec<SeriesPoint>> {
        let since = range.since(now.clone());
        let end = now.timestamp_millis();
        let width = range.bucket_width_secs();

        let conn = self.store.connect()?;

        let mut stmt = conn.prepare_cached(
            "SELECT (m.timestamp / 1000 / ?1) * ?1 * 1000 AS bucket,
                    AVG(m.temperature), AVG(m.humidity),
                    MAX(w.city), AVG(w.temp), AVG(w.humidity), AVG(w.wind_speed),
                    AVG(w.wind_deg), AVG(w.clouds), AVG(w.weather_code), MAX(w.description)
             FROM measurements m
             LEFT JOIN weather w ON m.weather_id = w.id
             WHERE m.timestamp >= ?2 AND m.timestamp <= ?3
             GROUP BY bucket
             HAVING COUNT(m.temperature) > 0
             ORDER BY bucket ASC",
        )?;

        let rows = stmt
            .query_map(params![width, since, end], row_to_point)?
            .collect::<Result<_, _>>()?;

        Ok(rows)
    }
}

/// Shared row mapping for both query shapes: 11 columns, measurement fields
/// first, weather fields nullable (unmatched rows render as 0 / "").
fn row_to_point(row: &Row<'_>) -> rusqlite::Result<SeriesPoint> {
    Ok(SeriesPoint {
        aggregated_timestamp: row.get(0)?,
        avg_temperature: row.get(1)?,
        avg_humidity: row.get(2)?,
        city: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        avg_weather_temp: row.get::<_, Option<f64>>(4)?.unwrap_or_default(),
        avg_weather_humidity: row.get::<_, Option<f64>>(5)?.unwrap_or_default(),
        avg_wind_speed: row.get::<_, Option<f64>>(6)?.unwrap_or_default(),
        avg_wind_deg: row.get::<_, Option<f64>>(7)?.unwrap_or_default(),
        avg_clouds: row.get::<_, Option<f64>>(8)?.unwrap_or_default(),
        avg_weather_code: row.get::<_, Option<f64>>(9)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::{Measurement, WeatherSample};
    use crate::storage::writer::CorrelationWriter;
    use chrono::Utc;
    use tempfile::tempdir;

    fn test_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("telemetry.db")).unwrap();
        (store, dir)
    }

    fn sample(city: &str, temp: f64) -> WeatherSample {
        WeatherSample {
            city: city.to_string(),
            temp_celsius: temp,
            humidity: 60,
            wind_speed: 3.2,
            wind_deg: 180,
            clouds: 40,
            weather_code: 2,
            description: "Partly cloudy".to_string(),
        }
    }

    #[test]
    fn test_range_parsing() {
        assert_eq!(Range::parse("1h"), Range::OneHour);
        assert_eq!(Range::parse("24h"), Range::Day);
        assert_eq!(Range::parse("today"), Range::Today);
        assert_eq!(Range::parse("year"), Range::Year);
        assert_eq!(Range::parse(""), Range::All);
        assert_eq!(Range::parse("fortnight"), Range::All);
    }

    #[test]
    fn test_bucket_widths() {
        assert_eq!(Range::OneHour.bucket_width_secs(), 60);
        assert_eq!(Range::Today.bucket_width_secs(), 60);
        assert_eq!(Range::Week.bucket_width_secs(), 3600);
        assert_eq!(Range::Month.bucket_width_secs(), 86_400);
        assert_eq!(Range::All.bucket_width_secs(), 86_400);
    }

    #[test]
    fn test_today_starts_at_local_midnight() {
        let now = Local::now();
        let since = Range::Today.since(now);

        let midnight = now.date_naive().and_time(NaiveTime::MIN);
        let expected = Local
            .from_local_datetime(&midnight)
            .earliest()
            .unwrap()
            .timestamp_millis();
        assert_eq!(since, expected);
    }

    #[test]
    fn test_rolling_windows() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(Range::OneHour.since(now), now.timestamp_millis() - 3_600_000);
        assert_eq!(
            Range::Week.since(now),
            now.timestamp_millis() - 7 * 86_400_000
        );
        assert_eq!(Range::All.since(now), 0);
    }

    #[test]
    fn test_month_is_calendar_based() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        // March 31 minus one month clamps to February 29
        let expected = Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap();
        assert_eq!(Range::Month.since(now), expected.timestamp_millis());
    }

    #[test]
    fn test_latest_with_trajectory() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        writer
            .append_measurement(&Measurement::new(1_000, 20.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(2_000, 25.0, 51.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(3_000, 29.0, 52.0))
            .unwrap();

        let snapshot = QueryEngine::new(store).latest_with_trajectory().unwrap();

        assert_eq!(snapshot.latest.aggregated_timestamp, 3_000);
        assert_eq!(snapshot.latest.avg_temperature, 29.0);
        // newest (29.0) minus oldest (20.0) across the window
        assert_eq!(snapshot.trajectory, Some(9.0));
    }

    #[test]
    fn test_trajectory_window_is_bounded() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        // 15 readings; only the 10 most recent count
        for i in 0..15 {
            writer
                .append_measurement(&Measurement::new(i * 1_000, i as f64, 50.0))
                .unwrap();
        }

        let snapshot = QueryEngine::new(store).latest_with_trajectory().unwrap();
        // newest = 14.0, oldest in window = 5.0
        assert_eq!(snapshot.trajectory, Some(9.0));
    }

    #[test]
    fn test_latest_on_single_row_has_no_trajectory() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();
        writer
            .append_measurement(&Measurement::new(1_000, 22.5, 55.1))
            .unwrap();

        let snapshot = QueryEngine::new(store).latest_with_trajectory().unwrap();
        assert_eq!(snapshot.trajectory, None);
    }

    #[test]
    fn test_latest_on_empty_store_errors() {
        let (store, _dir) = test_store();
        let err = QueryEngine::new(store).latest_with_trajectory();
        assert!(matches!(err, Err(StoreError::Empty)));
    }

    #[test]
    fn test_latest_renders_unmatched_weather_as_zero() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();
        writer
            .append_measurement(&Measurement::new(1_000, 22.5, 55.1))
            .unwrap();

        let snapshot = QueryEngine::new(store).latest_with_trajectory().unwrap();
        assert_eq!(snapshot.latest.city, "");
        assert_eq!(snapshot.latest.avg_weather_temp, 0.0);
        assert_eq!(snapshot.latest.avg_weather_humidity, 0.0);
        assert_eq!(snapshot.latest.description, "");
    }

    #[test]
    fn test_all_time_series_collapses_to_daily_buckets() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        // Three readings on the same UTC day plus one the day after
        writer
            .append_measurement(&Measurement::new(60_000, 20.0, 40.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(90_000, 30.0, 60.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(125_000, 10.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(86_400_000 + 1_000, 12.0, 55.0))
            .unwrap();

        let now = Utc.timestamp_millis_opt(2 * 86_400_000).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::All, now)
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].aggregated_timestamp, 0);
        assert_eq!(series[0].avg_temperature, 20.0);
        assert_eq!(series[0].avg_humidity, 50.0);
        assert_eq!(series[1].aggregated_timestamp, 86_400_000);
        assert_eq!(series[1].avg_temperature, 12.0);
    }

    #[test]
    fn test_series_bucket_width_by_range() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        let base = 1_700_000_000_000_i64; // inside the last 24h anchor below
        writer
            .append_measurement(&Measurement::new(base, 20.0, 40.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(base + 30_000, 30.0, 60.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(base + 65_000, 10.0, 50.0))
            .unwrap();

        let now = Utc.timestamp_millis_opt(base + 120_000).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::OneHour, now)
            .unwrap();

        // base is 60s-aligned: first bucket averages the first two readings
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].aggregated_timestamp, base);
        assert_eq!(series[0].avg_temperature, 25.0);
        assert_eq!(series[1].aggregated_timestamp, base + 60_000);
        assert_eq!(series[1].avg_temperature, 10.0);
    }

    #[test]
    fn test_series_orders_buckets_ascending() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        // Inserted newest-first
        writer
            .append_measurement(&Measurement::new(500_000, 10.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(100_000, 20.0, 50.0))
            .unwrap();

        let now = Utc.timestamp_millis_opt(600_000).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::OneHour, now)
            .unwrap();

        assert!(series.windows(2).all(|w| w[0].aggregated_timestamp < w[1].aggregated_timestamp));
    }

    #[test]
    fn test_series_skips_empty_buckets() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        // Two readings 10 minutes apart: 8 intervening 60s buckets stay absent
        writer
            .append_measurement(&Measurement::new(0, 20.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(600_000, 21.0, 51.0))
            .unwrap();

        let now = Utc.timestamp_millis_opt(900_000).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::OneHour, now)
            .unwrap();

        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_series_excludes_rows_before_since() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        let now_ms = 10 * 3_600_000_i64;
        writer
            .append_measurement(&Measurement::new(1_000, 20.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(now_ms - 60_000, 25.0, 50.0))
            .unwrap();

        let now = Utc.timestamp_millis_opt(now_ms).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::OneHour, now)
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].avg_temperature, 25.0);
    }

    #[test]
    fn test_series_text_fields_take_max_representative() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        let a = writer.append_weather(0, &sample("Aberdeen", 10.0)).unwrap();
        let b = writer.append_weather(1_000, &sample("Zagreb", 12.0)).unwrap();

        // Force the links so both cities land in one bucket
        let conn = store.connect().unwrap();
        writer
            .append_measurement(&Measurement::new(500, 20.0, 50.0))
            .unwrap();
        writer
            .append_measurement(&Measurement::new(1_500, 21.0, 51.0))
            .unwrap();
        conn.execute("UPDATE measurements SET weather_id = ?1 WHERE timestamp = 500", params![a])
            .unwrap();
        conn.execute("UPDATE measurements SET weather_id = ?1 WHERE timestamp = 1500", params![b])
            .unwrap();

        let now = Utc.timestamp_millis_opt(30_000).unwrap();
        let series = QueryEngine::new(store)
            .ranged_series_at(Range::OneHour, now)
            .unwrap();

        assert_eq!(series.len(), 1);
        // MAX() picks the lexicographically greatest city, not the most frequent
        assert_eq!(series[0].city, "Zagreb");
        assert_eq!(series[0].avg_weather_temp, 11.0);
    }

    #[test]
    fn test_series_deterministic_across_now_captures() {
        let (store, _dir) = test_store();
        let mut writer = CorrelationWriter::new(&store).unwrap();

        let base = 1_700_000_000_000_i64;
        for i in 0..5 {
            writer
                .append_measurement(&Measurement::new(base + i * 10_000, 20.0 + i as f64, 50.0))
                .unwrap();
        }

        let engine = QueryEngine::new(store);
        // Two calls capturing "now" a few seconds apart within one bucket
        let first = engine
            .ranged_series_at(Range::Day, Utc.timestamp_millis_opt(base + 100_000).unwrap())
            .unwrap();
        let second = engine
            .ranged_series_at(Range::Day, Utc.timestamp_millis_opt(base + 103_000).unwrap())
            .unwrap();

        assert_eq!(first, second);
    }
}
