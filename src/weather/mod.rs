//! Ambient weather enrichment
//!
//! A [`WeatherProvider`] resolves the configured city to a current-conditions
//! snapshot; the refresher polls it on a timer and broadcasts the latest
//! sample. Helpers translate WMO weather codes and wind degrees into the
//! human-readable forms the dashboard and console use.

pub mod open_meteo;
pub mod refresher;

pub use open_meteo::OpenMeteoProvider;
pub use refresher::{run as run_refresher, LatestWeather};

use async_trait::async_trait;
use thiserror::Error;

use crate::storage::WeatherSample;

/// Failures while fetching a weather sample.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Could not reach the provider.
    #[error("weather request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider answered with a non-success status.
    #[error("weather request returned status {0}")]
    HttpStatus(reqwest::StatusCode),

    /// Provider payload did not parse.
    #[error("failed to decode weather response: {0}")]
    Decode(String),

    /// The city is unknown to the geocoder.
    #[error("no results found for city: {0}")]
    NoResults(String),
}

/// Source of current-conditions snapshots for a city.
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, city: &str) -> Result<WeatherSample, WeatherError>;
}

/// Human-readable sentence for a WMO weather interpretation code.
///
/// https://open-meteo.com/en/docs#weather_variable_documentation
pub fn weather_code_to_sentence(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown weather code",
    }
}

/// Compass point for a wind direction in degrees.
///
/// Eight 45-degree sectors centered on their midpoints (N covers
/// 337.5-22.5, NE 22.5-67.5, ...). Out-of-range input yields "".
pub fn wind_direction_to_compass(deg: i64) -> &'static str {
    if !(0..=359).contains(&deg) {
        return "";
    }

    const DIRECTIONS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let idx = ((deg as f64 + 22.5) / 45.0) as usize % 8;
    DIRECTIONS[idx]
}
