//! Core row types for the measurement store
//!
//! - `Measurement`: one decoded sensor reading, timestamped by the core
//! - `WeatherSample`: one ambient-weather snapshot for the configured city
//! - `SeriesPoint`: a joined (or bucket-averaged) row as served to the
//!   dashboard; field names on the wire are the frontend's contract

use serde::{Deserialize, Serialize};

/// A single temperature/humidity reading from the device.
///
/// The timestamp is assigned by the core at decode time; the device payload
/// carries no clock.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    /// Temperature in degrees Celsius
    pub temperature_celsius: f64,
    /// Relative humidity in percent
    pub humidity_percent: f64,
}

impl Measurement {
    /// Create a measurement with an explicit timestamp.
    pub fn new(timestamp: i64, temperature_celsius: f64, humidity_percent: f64) -> Self {
        Self {
            timestamp,
            temperature_celsius,
            humidity_percent,
        }
    }
}

/// One ambient-weather snapshot as fetched from the provider.
///
/// Never upserted: each fetch appends a fresh row, timestamped at fetch time
/// by the refresher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    /// Resolved city name
    pub city: String,
    /// Outdoor temperature in degrees Celsius
    pub temp_celsius: f64,
    /// Relative humidity in percent
    pub humidity: i64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Wind direction in degrees (0-359)
    pub wind_deg: i64,
    /// Cloud cover in percent
    pub clouds: i64,
    /// WMO weather code
    pub weather_code: i64,
    /// Human-readable conditions
    pub description: String,
}

/// A joined measurement/weather row as served by the dashboard API.
///
/// The same shape is used for raw latest rows and for bucket averages; for
/// buckets, `aggregated_timestamp` is the bucket start. Serialized field
/// names (`AggregatedTimestamp`, `AvgTemperature`, ...) are what the
/// frontend charts bind to - do not rename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeriesPoint {
    pub aggregated_timestamp: i64,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub city: String,
    pub avg_weather_temp: f64,
    pub avg_weather_humidity: f64,
    pub avg_wind_speed: f64,
    pub avg_wind_deg: f64,
    pub avg_clouds: f64,
    pub avg_weather_code: f64,
    pub description: String,
}

/// Latest reading plus the short-window temperature trend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestSnapshot {
    /// Most recent measurement, weather-joined
    pub latest: SeriesPoint,
    /// temperature(newest) - temperature(oldest) over the trend window,
    /// `null` when fewer than two readings exist
    pub trajectory: Option<f64>,
}
