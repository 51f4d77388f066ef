//! Configuration system
//!
//! TOML config file with serde defaults; CLI flags override individual
//! fields in the binary. Every section works standalone so a bare
//! `skogsnet` with no file still comes up with sane defaults.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

/// Serial device configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_path")]
    pub path: String,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_device_path() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_read_timeout_ms() -> u64 {
    2_000
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            path: default_device_path(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "measurements.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Weather enrichment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub city: String,

    #[serde(default = "default_fetch_interval_secs")]
    pub fetch_interval_secs: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_weather_enabled")]
    pub enabled: bool,
}

fn default_fetch_interval_secs() -> u64 {
    60
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_weather_enabled() -> bool {
    true
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            city: String::new(),
            fetch_interval_secs: default_fetch_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            enabled: default_weather_enabled(),
        }
    }
}

/// Dashboard listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_host")]
    pub host: String,

    #[serde(default = "default_dashboard_port")]
    pub port: u16,

    #[serde(default = "default_dashboard_enabled")]
    pub enabled: bool,
}

fn default_dashboard_host() -> String {
    "0.0.0.0".to_string()
}

fn default_dashboard_port() -> u16 {
    8080
}

fn default_dashboard_enabled() -> bool {
    true
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_dashboard_host(),
            port: default_dashboard_port(),
            enabled: default_dashboard_enabled(),
        }
    }
}

impl DashboardConfig {
    /// Socket address string for the listener.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
