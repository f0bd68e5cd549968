//! Sensor HTTP Client

use crate::error::SensorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// One sample as reported by the sensor
///
/// Either field may be absent or null; at least one of the two keys must be
/// present in the body for it to count as a sample at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    #[serde(default)]
    pub turbidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl SensorSample {
    const FIELDS: [&'static str; 2] = ["turbidity", "temperature"];

    /// Parse a sensor response body
    pub fn from_json(body: &[u8]) -> Result<Self, SensorError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| SensorError::MalformedBody(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| SensorError::MalformedBody("expected a JSON object".to_string()))?;

        if !Self::FIELDS.iter().any(|field| object.contains_key(*field)) {
            return Err(SensorError::MalformedBody(
                "neither turbidity nor temperature present".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| SensorError::MalformedBody(e.to_string()))
    }
}

/// HTTP client for a single sensor endpoint
#[derive(Debug, Clone)]
pub struct SensorClient {
    url: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl SensorClient {
    /// Create a client for `url` with a per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SensorError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url: url.into(),
            timeout,
            http,
        })
    }

    /// Sensor URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one GET and decode the sample
    pub async fn fetch(&self) -> Result<SensorSample, SensorError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SensorError::Status(status));
        }

        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let sample = SensorSample::from_json(&body)?;
        debug!("Fetched sample from {}: {:?}", self.url, sample);
        Ok(sample)
    }

    fn classify(&self, err: reqwest::Error) -> SensorError {
        if err.is_timeout() {
            SensorError::Timeout(self.timeout)
        } else {
            SensorError::Request(err)
        }
    }
}
