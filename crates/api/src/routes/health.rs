//! Health Routes

use axum::{extract::State, http::StatusCode, Json};
use collector::CollectorSnapshot;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub collector: CollectorSnapshot,
    pub readings: i64,
}

/// Fixed liveness payload
pub async fn liveness() -> Json<Value> {
    Json(json!([1]))
}

/// Process and collector health
///
/// 503 once the collector task has stopped.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    let collector = state.collector.snapshot();
    let readings = state.repository.count().await?;

    let (code, status) = if collector.running {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    Ok((
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: state.version.clone(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
            collector,
            readings,
        }),
    ))
}
