//! Water Quality Monitor API Server
//!
//! REST API over the stored sensor readings. Also owns process startup:
//! the collector is spawned here before the listener accepts requests.

use anyhow::Context;
use axum::{routing::get, Router};
use collector::{Collector, CollectorStatus};
use std::sync::Arc;
use std::time::Instant;
use storage::Repository;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod cors;
pub mod error;
pub mod routes;

use crate::config::{ApiConfig, AppConfig, LogConfig, LogFormat};

/// Application state shared across handlers
///
/// Read-only after startup; the store does its own concurrency control.
pub struct AppState {
    /// Reading store
    pub repository: Repository,
    /// Collector liveness
    pub collector: Arc<CollectorStatus>,
    /// Readings endpoint limits
    pub limits: ApiConfig,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(repository: Repository, collector: Arc<CollectorStatus>, limits: ApiConfig) -> Self {
        Self {
            repository,
            collector,
            limits,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
        }
    }

    /// Effective `limit` for a readings query
    pub fn readings_limit(&self, requested: Option<u64>) -> u64 {
        let limit = requested.unwrap_or(self.limits.default_readings_limit);
        match self.limits.max_readings_limit {
            Some(max) => limit.min(max),
            None => limit,
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/test", get(routes::health::liveness))
        .route("/api/health", get(routes::health::health))
        .route("/api/readings", get(routes::readings::get_readings))
        .route("/api/latest", get(routes::readings::get_latest))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
}

/// Run the collector and the server until ctrl-c
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let repository = Repository::connect(&config.database.url)
        .await
        .with_context(|| format!("opening database {}", config.database.url))?;
    repository
        .initialize()
        .await
        .context("creating readings table")?;

    let cors = config.cors.layer()?;
    info!("CORS policy: {:?}", config.cors.policy);

    let collector = Collector::new(config.sensor.collector_config(), repository.clone())
        .context("building sensor client")?;
    let handle = collector::spawn(collector);

    let state = Arc::new(AppState::new(repository.clone(), handle.status(), config.api));
    let app = create_router(state, cors);

    let addr = config.server.address();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if handle.is_finished() {
        warn!("Collector task had already stopped before shutdown");
    }
    handle.abort();
    repository.close().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
