//! Weather refresher
//!
//! Keeps the weather stream warm: a blocking startup phase retries the first
//! fetch until it lands (or cancellation), then a periodic timer drives
//! steady-state fetch-and-write cycles. The newest sample is broadcast
//! through a `watch` cell - the refresher is its only writer, the ingestion
//! console report and anything else interested just hold receivers. A failed
//! steady-state fetch keeps the previous cached sample as "latest".

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::WeatherProvider;
use crate::logging::LogGate;
use crate::storage::{CorrelationWriter, WeatherSample};
use crate::throttled_error;

/// Delay between startup fetch attempts.
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Default steady-state fetch cadence.
pub const DEFAULT_FETCH_INTERVAL: Duration = Duration::from_secs(60);

/// Read side of the latest-sample cell.
pub type LatestWeather = watch::Receiver<Option<WeatherSample>>;

/// Create the latest-sample cell, initially empty.
pub fn latest_channel() -> (watch::Sender<Option<WeatherSample>>, LatestWeather) {
    watch::channel(None)
}

/// Run the refresher until cancellation.
pub async fn run(
    provider: Arc<dyn WeatherProvider>,
    mut writer: CorrelationWriter,
    city: String,
    fetch_interval: Duration,
    latest: watch::Sender<Option<WeatherSample>>,
    cancel: CancellationToken,
) {
    let mut fetch_gate = LogGate::new();
    let mut insert_gate = LogGate::new();

    // Startup: retry until the first sample lands. Every attempt is logged -
    // a cold start with no weather is worth being loud about.
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("weather refresher stopped before first sample");
                return;
            }
            result = provider.fetch(&city) => result,
        };

        match result {
            Ok(sample) => {
                store_and_publish(&mut writer, &latest, sample, &mut insert_gate);
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, city = %city, "initial weather fetch failed, retrying");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(STARTUP_RETRY_DELAY) => {}
                }
            }
        }
    }

    let mut ticker = tokio::time::interval(fetch_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // interval fires immediately; the warm-up fetch already covered that slot
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = provider.fetch(&city) => result,
        };

        match result {
            Ok(sample) => store_and_publish(&mut writer, &latest, sample, &mut insert_gate),
            Err(e) => {
                // Keep the cached sample; the outage is transient until proven otherwise
                throttled_error!(fetch_gate, error = %e, city = %city, "weather fetch failed");
            }
        }
    }

    tracing::info!("weather refresher stopped");
}

/// Append the sample (timestamped now) and swap it into the cell.
///
/// A failed insert is logged and otherwise tolerated - the cell still gets
/// the fresh sample so readers see current conditions.
fn store_and_publish(
    writer: &mut CorrelationWriter,
    latest: &watch::Sender<Option<WeatherSample>>,
    sample: WeatherSample,
    insert_gate: &mut LogGate,
) {
    let timestamp = Utc::now().timestamp_millis();
    if let Err(e) = writer.append_weather(timestamp, &sample) {
        throttled_error!(insert_gate, error = %e, "failed to store weather sample");
    }
    latest.send_replace(Some(sample));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use crate::weather::WeatherError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<WeatherSample, WeatherError>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<WeatherSample, WeatherError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl WeatherProvider for ScriptedProvider {
        async fn fetch(&self, city: &str) -> Result<WeatherSample, WeatherError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(WeatherError::NoResults(city.to_string())))
        }
    }

    fn sample(temp: f64) -> WeatherSample {
        WeatherSample {
            city: "Helsinki".to_string(),
            temp_celsius: temp,
            humidity: 60,
            wind_speed: 3.2,
            wind_deg: 180,
            clouds: 40,
            weather_code: 2,
            description: "Partly cloudy".to_string(),
        }
    }

    fn weather_rows(store: &Store) -> i64 {
        let conn = store.connect().unwrap();
        conn.query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_retries_until_first_sample() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("telemetry.db")).unwrap();
        let writer = CorrelationWriter::new(&store).unwrap();

        let provider = ScriptedProvider::new(vec![
            Err(WeatherError::NoResults("Helsinki".to_string())),
            Err(WeatherError::NoResults("Helsinki".to_string())),
            Ok(sample(24.5)),
        ]);

        let (tx, rx) = latest_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            provider,
            writer,
            "Helsinki".to_string(),
            DEFAULT_FETCH_INTERVAL,
            tx,
            cancel.clone(),
        ));

        // Two 500ms backoffs, then success
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(weather_rows(&store), 1);
        assert_eq!(rx.borrow().as_ref().unwrap().temp_celsius, 24.5);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_state_failure_keeps_cached_sample() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("telemetry.db")).unwrap();
        let writer = CorrelationWriter::new(&store).unwrap();

        let provider = ScriptedProvider::new(vec![
            Ok(sample(20.0)),
            Err(WeatherError::NoResults("Helsinki".to_string())),
            Ok(sample(22.0)),
        ]);

        let (tx, rx) = latest_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            provider,
            writer,
            "Helsinki".to_string(),
            DEFAULT_FETCH_INTERVAL,
            tx,
            cancel.clone(),
        ));

        // Warm-up sample
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(rx.borrow().as_ref().unwrap().temp_celsius, 20.0);

        // First tick fails: cache survives
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(rx.borrow().as_ref().unwrap().temp_celsius, 20.0);
        assert_eq!(weather_rows(&store), 1);

        // Second tick succeeds: cache moves on
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(rx.borrow().as_ref().unwrap().temp_celsius, 22.0);
        assert_eq!(weather_rows(&store), 2);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_startup_exits() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("telemetry.db")).unwrap();
        let writer = CorrelationWriter::new(&store).unwrap();

        // Provider that never succeeds
        let provider = ScriptedProvider::new(vec![]);

        let (tx, _rx) = latest_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            provider,
            writer,
            "Helsinki".to_string(),
            DEFAULT_FETCH_INTERVAL,
            tx,
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(weather_rows(&store), 0);
    }
}
