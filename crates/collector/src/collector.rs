//! Polling Loop Implementation

use crate::error::SensorError;
use crate::sensor::SensorClient;
use crate::status::{CollectorHandle, CollectorStatus, RunningGuard};
use std::sync::Arc;
use std::time::Duration;
use storage::{Reading, Repository, StorageError};
use tracing::{debug, error, info, warn};

/// Configuration for the collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Sensor endpoint (default: "http://192.168.4.1/data")
    pub sensor_url: String,
    /// Delay between the end of one cycle and the start of the next (default: 5s)
    pub interval: Duration,
    /// Per-request timeout for the sensor fetch (default: 2s)
    pub request_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            sensor_url: "http://192.168.4.1/data".to_string(),
            interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Result of a single polling cycle
#[derive(Debug)]
pub enum CycleOutcome {
    /// Sample fetched and persisted
    Stored(Reading),
    /// Sensor unreachable or answered badly; nothing was written
    FetchFailed(SensorError),
    /// Sample fetched but the write failed
    StoreFailed(StorageError),
}

/// Bridges the sensor endpoint and the reading store
pub struct Collector {
    client: SensorClient,
    repository: Repository,
    interval: Duration,
    status: Arc<CollectorStatus>,
}

impl Collector {
    /// Create a new collector writing into `repository`
    pub fn new(config: CollectorConfig, repository: Repository) -> Result<Self, SensorError> {
        let client = SensorClient::new(config.sensor_url, config.request_timeout)?;
        info!(
            "Collector created for {} (interval {:?}, timeout {:?})",
            client.url(),
            config.interval,
            config.request_timeout
        );

        Ok(Self {
            client,
            repository,
            interval: config.interval,
            status: Arc::new(CollectorStatus::default()),
        })
    }

    /// Shared status of this collector
    pub fn status(&self) -> Arc<CollectorStatus> {
        Arc::clone(&self.status)
    }

    /// Fetch one sample and store it. Never fails; the outcome says what happened.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.status.record_cycle();
        metrics::counter!("collector_cycles_total").increment(1);

        let sample = match self.client.fetch().await {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Error fetching data from {}: {}", self.client.url(), e);
                metrics::counter!("collector_fetch_failures_total").increment(1);
                self.status.record_fetch_failure(e.to_string());
                return CycleOutcome::FetchFailed(e);
            }
        };

        match self
            .repository
            .insert(sample.turbidity, sample.temperature)
            .await
        {
            Ok(reading) => {
                debug!(
                    "Stored reading {} (turbidity={:?}, temperature={:?}) at {}",
                    reading.id, reading.turbidity, reading.temperature, reading.timestamp
                );
                metrics::counter!("collector_readings_stored_total").increment(1);
                self.status.record_stored(reading.timestamp);
                CycleOutcome::Stored(reading)
            }
            Err(e) => {
                error!("Failed to store reading: {}", e);
                metrics::counter!("collector_store_failures_total").increment(1);
                self.status.record_store_failure(e.to_string());
                CycleOutcome::StoreFailed(e)
            }
        }
    }

    /// Initialize the store, then poll forever
    pub async fn run(self) {
        info!("Starting collector");

        while let Err(e) = self.repository.initialize().await {
            error!("Failed to initialize store, retrying in {:?}: {}", self.interval, e);
            self.status.record_store_failure(e.to_string());
            tokio::time::sleep(self.interval).await;
        }

        loop {
            self.run_cycle().await;
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Run `collector` as a background task
///
/// The status reports the task as running from the moment this returns
/// until the task ends for any reason.
pub fn spawn(collector: Collector) -> CollectorHandle {
    let status = collector.status();
    let guard = RunningGuard::new(Arc::clone(&status));

    let task = tokio::spawn(async move {
        let _guard = guard;
        collector.run().await;
    });

    CollectorHandle { status, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use chrono::{SubsecRound, Utc};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Serve `router` on a random local port and return the sensor URL
    async fn start_sensor(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/data", addr)
    }

    async fn repo() -> Repository {
        let repo = Repository::in_memory().await.unwrap();
        repo.initialize().await.unwrap();
        repo
    }

    fn config(url: String) -> CollectorConfig {
        CollectorConfig {
            sensor_url: url,
            interval: Duration::from_millis(20),
            request_timeout: Duration::from_millis(200),
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..250 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[test]
    fn test_default_config() {
        let config = CollectorConfig::default();
        assert_eq!(config.sensor_url, "http://192.168.4.1/data");
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_successful_fetch_stores_one_reading() {
        let url = start_sensor(Router::new().route(
            "/data",
            get(|| async { Json(json!({"turbidity": 3.2, "temperature": 21.5})) }),
        ))
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        let started = Utc::now().trunc_subsecs(3);
        let reading = match collector.run_cycle().await {
            CycleOutcome::Stored(reading) => reading,
            other => panic!("expected a stored reading, got {:?}", other),
        };
        assert_eq!(reading.turbidity, Some(3.2));
        assert_eq!(reading.temperature, Some(21.5));
        assert!(reading.timestamp >= started);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.latest().await.unwrap(), reading);
        assert_eq!(collector.status().snapshot().stored, 1);
    }

    #[tokio::test]
    async fn test_null_fields_are_stored_as_null() {
        let url = start_sensor(Router::new().route(
            "/data",
            get(|| async { Json(json!({"turbidity": null, "temperature": 18.25})) }),
        ))
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        assert!(matches!(collector.run_cycle().await, CycleOutcome::Stored(_)));
        let latest = repo.latest().await.unwrap();
        assert_eq!(latest.turbidity, None);
        assert_eq!(latest.temperature, Some(18.25));
    }

    #[tokio::test]
    async fn test_server_error_stores_nothing() {
        let url = start_sensor(Router::new().route(
            "/data",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        ))
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        let outcome = collector.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::FetchFailed(SensorError::Status(status)) if status.as_u16() == 500
        ));
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(collector.status().snapshot().fetch_failures, 1);
    }

    #[tokio::test]
    async fn test_unexpected_shape_stores_nothing() {
        let url = start_sensor(
            Router::new().route("/data", get(|| async { Json(json!({"foo": 1})) })),
        )
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        let outcome = collector.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::FetchFailed(SensorError::MalformedBody(_))
        ));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_slow_sensor_times_out() {
        let url = start_sensor(Router::new().route(
            "/data",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Json(json!({"turbidity": 1.0, "temperature": 1.0}))
            }),
        ))
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        let outcome = collector.run_cycle().await;
        assert!(matches!(
            outcome,
            CycleOutcome::FetchFailed(SensorError::Timeout(_))
        ));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_sensor() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let repo = repo().await;
        let collector = Collector::new(config(format!("http://{}/data", addr)), repo.clone()).unwrap();

        let outcome = collector.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::FetchFailed(_)));
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let url = start_sensor(Router::new().route(
            "/data",
            get(|| async { Json(json!({"turbidity": 2.0, "temperature": 20.0})) }),
        ))
        .await;
        let repo = repo().await;
        let collector = Collector::new(config(url), repo.clone()).unwrap();
        repo.close().await;

        let outcome = collector.run_cycle().await;
        assert!(matches!(outcome, CycleOutcome::StoreFailed(_)));
        let snapshot = collector.status().snapshot();
        assert_eq!(snapshot.store_failures, 1);
        assert!(snapshot.last_error.is_some());
    }

    #[tokio::test]
    async fn test_loop_survives_failures() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route(
            "/data",
            get({
                let hits = Arc::clone(&hits);
                move || async move {
                    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StatusCode::INTERNAL_SERVER_ERROR)
                    } else {
                        Ok(Json(json!({"turbidity": 5.0, "temperature": 22.0})))
                    }
                }
            }),
        );
        let url = start_sensor(router).await;
        let repo = Repository::in_memory().await.unwrap();
        let collector = Collector::new(config(url), repo.clone()).unwrap();

        let handle = spawn(collector);
        let status = handle.status();
        assert!(status.is_running());

        assert!(wait_until(|| status.snapshot().stored >= 2).await);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.fetch_failures, 2);
        assert!(snapshot.running);
        assert!(!handle.is_finished());
        assert!(repo.count().await.unwrap() >= 2);

        handle.abort();
        assert!(wait_until(|| !status.is_running()).await);
    }

    #[tokio::test]
    async fn test_loop_continues_past_every_failure_kind() {
        // timeout, HTTP 500, unexpected shape, success, then 500 from there on
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new().route(
            "/data",
            get({
                let hits = Arc::clone(&hits);
                move || async move {
                    match hits.fetch_add(1, Ordering::SeqCst) {
                        0 => {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            Ok(Json(json!({"turbidity": 9.0, "temperature": 9.0})))
                        }
                        2 => Ok(Json(json!({"foo": 1}))),
                        3 => Ok(Json(json!({"turbidity": 3.2, "temperature": 21.5}))),
                        _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
                    }
                }
            }),
        );
        let url = start_sensor(router).await;
        let repo = Repository::in_memory().await.unwrap();
        let interval = Duration::from_millis(100);
        let collector = Collector::new(
            CollectorConfig {
                sensor_url: url,
                interval,
                request_timeout: Duration::from_millis(150),
            },
            repo.clone(),
        )
        .unwrap();

        let started = std::time::Instant::now();
        let handle = spawn(collector);
        let status = handle.status();

        let mut at_first_store = None;
        for _ in 0..1000 {
            let snapshot = status.snapshot();
            if snapshot.stored >= 1 {
                at_first_store = Some((started.elapsed(), snapshot));
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let (elapsed, snapshot) = at_first_store.expect("collector never stored a reading");

        assert_eq!(snapshot.fetch_failures, 3);
        assert_eq!(snapshot.stored, 1);
        assert!(snapshot.running);
        assert!(elapsed >= interval * 3, "elapsed {:?}", elapsed);

        handle.abort();
        assert!(wait_until(|| !status.is_running()).await);
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.latest().await.unwrap().turbidity, Some(3.2));
    }
}
