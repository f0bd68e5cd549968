//! Sensor Error Types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching a sample from the sensor
#[derive(Debug, Error)]
pub enum SensorError {
    /// Connection or transport failure
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// No response within the request timeout
    #[error("Timeout waiting for sensor response after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// Sensor answered with a non-success status
    #[error("Sensor returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// Body is not the expected JSON shape
    #[error("Malformed sensor body: {0}")]
    MalformedBody(String),
}
