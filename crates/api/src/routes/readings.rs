//! Reading Routes

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::Reading;

use crate::error::ApiError;
use crate::AppState;

/// Query parameters for the readings endpoint
#[derive(Debug, Deserialize)]
pub struct ReadingsQuery {
    /// Maximum number of records to return
    pub limit: Option<u64>,
}

/// Response for the readings endpoint
#[derive(Debug, Serialize)]
pub struct ReadingsResponse {
    pub data: Vec<Reading>,
}

/// Response for the latest endpoint
#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub turbidity: Option<f64>,
    pub temperature: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl From<Reading> for LatestResponse {
    fn from(reading: Reading) -> Self {
        Self {
            turbidity: reading.turbidity,
            temperature: reading.temperature,
            timestamp: reading.timestamp,
        }
    }
}

/// Get recent readings, newest first
pub async fn get_readings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadingsQuery>,
) -> Result<Json<ReadingsResponse>, ApiError> {
    let limit = state.readings_limit(params.limit);
    let data = state.repository.list_recent(limit).await?;

    Ok(Json(ReadingsResponse { data }))
}

/// Get the most recent reading
pub async fn get_latest(
    State(state): State<Arc<AppState>>,
) -> Result<Json<LatestResponse>, ApiError> {
    let reading = state.repository.latest().await?;
    Ok(Json(reading.into()))
}
