//! Sensor ingestion
//!
//! The device pushes one JSON object per line over its transport. This
//! module decodes those lines into [`Measurement`]s and runs the long-lived
//! ingestion loop: read, decode, correlate, write. The loop never terminates
//! on error - transport hiccups back off and retry, bad payloads and failed
//! inserts drop the reading and move on - only cancellation stops it.

mod tty;

pub use tty::TtyLineSource;

use async_trait::async_trait;
use chrono::{Local, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::logging::LogGate;
use crate::storage::{CorrelationWriter, Measurement, WeatherSample};
use crate::{throttled_error, throttled_warn};

/// Backoff after a read timeout or an empty read.
pub const READ_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Transport failures. Never fatal: the loop retries indefinitely.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("device read timed out")]
    Timeout,

    #[error("device read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A payload that could not be decoded. The reading is dropped.
#[derive(Error, Debug)]
#[error("failed to decode reading: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// One line of text from the device.
///
/// An empty string means "no data right now"; a timeout surfaces as
/// [`TransportError::Timeout`]. Injected at construction so tests can script
/// the device.
#[async_trait]
pub trait LineSource: Send {
    async fn read_line(&mut self) -> Result<String, TransportError>;
}

/// Wire payload. The firmware spells it `temperature_celcius`; both fields
/// default to 0 when absent and unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawReading {
    #[serde(default)]
    temperature_celcius: f64,
    #[serde(default)]
    humidity: f64,
}

/// Decode one device line into a measurement.
///
/// The timestamp is supplied by the caller (the core's clock at decode
/// time); the payload itself carries none.
pub fn decode_reading(line: &str, timestamp: i64) -> Result<Measurement, DecodeError> {
    let raw: RawReading = serde_json::from_str(line)?;
    Ok(Measurement::new(
        timestamp,
        raw.temperature_celcius,
        raw.humidity,
    ))
}

/// Run the ingestion loop until cancellation.
///
/// `latest_weather` is the refresher's broadcast cell; the console report
/// for each accepted reading includes the cached conditions when present.
pub async fn run(
    mut source: Box<dyn LineSource>,
    mut writer: CorrelationWriter,
    latest_weather: watch::Receiver<Option<WeatherSample>>,
    cancel: CancellationToken,
) {
    let mut read_gate = LogGate::new();
    let mut empty_gate = LogGate::new();
    let mut decode_gate = LogGate::new();
    let mut insert_gate = LogGate::new();

    loop {
        if cancel.is_cancelled() {
            break;
        }

        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            result = source.read_line() => match result {
                Ok(line) => line,
                Err(e) => {
                    throttled_warn!(read_gate, error = %e, "device read failed, retrying");
                    wait_or_cancel(&cancel, READ_RETRY_DELAY).await;
                    continue;
                }
            },
        };

        if line.is_empty() {
            throttled_warn!(empty_gate, "no data from device, retrying");
            wait_or_cancel(&cancel, READ_RETRY_DELAY).await;
            continue;
        }

        let measurement = match decode_reading(&line, Utc::now().timestamp_millis()) {
            Ok(m) => m,
            Err(e) => {
                throttled_error!(decode_gate, error = %e, "dropping undecodable reading");
                continue;
            }
        };

        if let Err(e) = writer.append_measurement(&measurement) {
            throttled_error!(insert_gate, error = %e, "failed to store measurement");
            continue;
        }

        report_measurement(&measurement, latest_weather.borrow().as_ref());
    }

    tracing::info!("ingestion loop stopped");
}

/// Sleep for `delay` unless cancelled first.
async fn wait_or_cancel(cancel: &CancellationToken, delay: Duration) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(delay) => {}
    }
}

/// Console report for an accepted reading.
fn report_measurement(m: &Measurement, weather: Option<&WeatherSample>) {
    const GREEN: &str = "\x1b[32m";
    const CYAN: &str = "\x1b[36m";
    const RESET: &str = "\x1b[0m";

    let when = Local
        .timestamp_millis_opt(m.timestamp)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| m.timestamp.to_string());

    println!("{CYAN}Measurement at {when}{RESET}");
    println!(
        "    {GREEN}Temperature:{RESET} {:.2} \u{b0}C",
        m.temperature_celsius
    );
    println!("    {GREEN}Humidity:   {RESET} {:.2} %", m.humidity_percent);
    if let Some(w) = weather {
        println!(
            "    {GREEN}Outside:    {RESET} {:.1} \u{b0}C, {} ({})",
            w.temp_celsius, w.description, w.city
        );
        println!(
            "    {GREEN}Wind:       {RESET} {:.1} m/s {}",
            w.wind_speed,
            crate::weather::wind_direction_to_compass(w.wind_deg)
        );
    }
}
