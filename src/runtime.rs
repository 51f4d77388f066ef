//! Orchestration core
//!
//! Runs the three long-lived producers - ingestion loop, weather refresher,
//! dashboard listener - under one shared cancellation token, with a task
//! tracker so shutdown can wait for every producer to actually exit before
//! the process lets go of the store. Cancellation is cooperative: each
//! producer observes the token at every loop iteration or timer tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::api::{self, AppState};
use crate::ingest::{self, LineSource};
use crate::storage::{CorrelationWriter, WeatherSample};
use crate::weather::refresher::{self, LatestWeather};
use crate::weather::WeatherProvider;

/// Supervises the producer tasks and owns the shared shutdown signal.
pub struct Orchestrator {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Clone of the shared cancellation token.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the ingestion producer.
    pub fn spawn_ingestion(
        &self,
        source: Box<dyn LineSource>,
        writer: CorrelationWriter,
        latest_weather: LatestWeather,
    ) {
        let cancel = self.cancel.clone();
        self.tracker
            .spawn(ingest::run(source, writer, latest_weather, cancel));
    }

    /// Spawn the weather refresher.
    pub fn spawn_refresher(
        &self,
        provider: Arc<dyn WeatherProvider>,
        writer: CorrelationWriter,
        city: String,
        fetch_interval: Duration,
        latest: watch::Sender<Option<WeatherSample>>,
    ) {
        let cancel = self.cancel.clone();
        self.tracker.spawn(refresher::run(
            provider,
            writer,
            city,
            fetch_interval,
            latest,
            cancel,
        ));
    }

    /// Spawn the dashboard listener.
    ///
    /// A listener that fails to bind or serve logs the error and exits its
    /// task; the other producers keep running.
    pub fn spawn_dashboard(&self, state: AppState, addr: String) {
        let cancel = self.cancel.clone();
        self.tracker.spawn(async move {
            if let Err(e) = api::serve(state, &addr, cancel).await {
                tracing::error!(error = %e, "dashboard server error");
            }
        });
    }

    /// Trigger shutdown without waiting.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait until every spawned producer has exited.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Block until an OS shutdown signal, then cancel and drain all
    /// producers.
    pub async fn run_until_signal(&self) {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, stopping producers");
        self.shutdown();
        self.wait().await;
        tracing::info!("all producers stopped");
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::TransportError;
    use crate::storage::{QueryEngine, Store};
    use crate::weather::WeatherError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct ScriptedSource {
        script: VecDeque<String>,
    }

    #[async_trait]
    impl LineSource for ScriptedSource {
        async fn read_line(&mut self) -> Result<String, TransportError> {
            match self.script.pop_front() {
                Some(line) => Ok(line),
                None => Err(TransportError::Timeout),
            }
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl WeatherProvider for FixedProvider {
        async fn fetch(&self, _city: &str) -> Result<WeatherSample, WeatherError> {
            Ok(WeatherSample {
                city: "Helsinki".to_string(),
                temp_celsius: 24.5,
                humidity: 60,
                wind_speed: 3.2,
                wind_deg: 180,
                clouds: 40,
                weather_code: 2,
                description: "Partly cloudy".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_producers_drain_on_shutdown() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("telemetry.db")).unwrap();

        let orch = Orchestrator::new();
        let (latest_tx, latest_rx) = refresher::latest_channel();

        orch.spawn_refresher(
            Arc::new(FixedProvider),
            CorrelationWriter::new(&store).unwrap(),
            "Helsinki".to_string(),
            Duration::from_secs(60),
            latest_tx,
        );

        // The leading empty line makes ingestion back off 500ms first, so the
        // refresher's warm-up sample is stored before the reading arrives
        let source = ScriptedSource {
            script: VecDeque::from([
                String::new(),
                r#"{"temperature_celcius": 22.5, "humidity": 55.1}"#.to_string(),
            ]),
        };
        orch.spawn_ingestion(
            Box::new(source),
            CorrelationWriter::new(&store).unwrap(),
            latest_rx,
        );

        orch.spawn_dashboard(
            AppState::new(QueryEngine::new(store.clone())),
            "127.0.0.1:0".to_string(),
        );

        // Let the warm-up fetch and the scripted reading land
        tokio::time::sleep(Duration::from_secs(2)).await;

        orch.shutdown();
        orch.wait().await;

        let conn = store.connect().unwrap();
        let measurements: i64 = conn
            .query_row("SELECT COUNT(*) FROM measurements", [], |row| row.get(0))
            .unwrap();
        let weather: i64 = conn
            .query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))
            .unwrap();
        assert_eq!(measurements, 1);
        assert_eq!(weather, 1);

        // The reading arrived after the sample, well inside the match window
        let linked: Option<i64> = conn
            .query_row("SELECT weather_id FROM measurements", [], |row| row.get(0))
            .unwrap();
        assert!(linked.is_some());
    }

    #[tokio::test]
    async fn test_wait_returns_with_no_producers() {
        let orch = Orchestrator::new();
        orch.shutdown();
        orch.wait().await;
    }
}
