//! Open-Meteo weather provider
//!
//! Two-step fetch against the free Open-Meteo APIs: geocode the configured
//! city to coordinates, then read the current conditions for that point.
//! Responses are mapped into the store's [`WeatherSample`] shape, with the
//! WMO code expanded to a description sentence.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{weather_code_to_sentence, WeatherError, WeatherProvider};
use crate::storage::WeatherSample;

const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const CURRENT_FIELDS: &str = "temperature_2m,weather_code,precipitation,\
relative_humidity_2m,wind_speed_10m,wind_direction_10m";

/// Open-Meteo client.
pub struct OpenMeteoProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoResult>,
}

#[derive(Debug, Deserialize)]
struct GeoResult {
    name: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    #[serde(default)]
    temperature_2m: f64,
    #[serde(default)]
    weather_code: i64,
    #[serde(default)]
    relative_humidity_2m: i64,
    #[serde(default)]
    wind_speed_10m: f64,
    #[serde(default)]
    wind_direction_10m: i64,
}

impl OpenMeteoProvider {
    /// Provider with the given request timeout.
    pub fn new(request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("failed to create HTTP client");

        Self { client }
    }

    /// Resolve a city name to its best geocoding match.
    async fn geocode(&self, city: &str) -> Result<GeoResult, WeatherError> {
        let response = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", city), ("count", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::HttpStatus(response.status()));
        }

        let geo: GeoResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Decode(e.to_string()))?;

        geo.results
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::NoResults(city.to_string()))
    }
}

#[async_trait]
impl WeatherProvider for OpenMeteoProvider {
    async fn fetch(&self, city: &str) -> Result<WeatherSample, WeatherError> {
        let place = self.geocode(city).await?;

        let response = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", format!("{:.4}", place.latitude)),
                ("longitude", format!("{:.4}", place.longitude)),
                ("current", CURRENT_FIELDS.to_string()),
                ("wind_speed_unit", "ms".to_string()),
                ("temperature_unit", "celsius".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WeatherError::HttpStatus(response.status()));
        }

        let forecast: ForecastResponse = response
            .json()
            .await
            .map_err(|e| WeatherError::Decode(e.to_string()))?;

        let current = forecast.current;
        Ok(WeatherSample {
            city: place.name,
            temp_celsius: current.temperature_2m,
            humidity: current.relative_humidity_2m,
            wind_speed: current.wind_speed_10m,
            wind_deg: current.wind_direction_10m,
            // Open-Meteo's current block carries no cloud-cover field in
            // this variable set; the column stays 0 as the dashboard expects
            clouds: 0,
            weather_code: current.weather_code,
            description: weather_code_to_sentence(current.weather_code).to_string(),
        })
    }
}
