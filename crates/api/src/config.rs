//! Application Configuration
//!
//! Layered in order of precedence: environment variables prefixed with
//! `WATER_MONITOR_` (nested keys separated by `__`), the optional TOML file,
//! then the built-in defaults below.

use collector::CollectorConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::cors::CorsConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "WATER_MONITOR";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub sensor: SensorConfig,
    pub api: ApiConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (default: "0.0.0.0")
    pub host: String,
    /// Port (default: 8000)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Reading store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite connection URL (default: "sqlite:water_quality.db")
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:water_quality.db".to_string(),
        }
    }
}

/// Sensor polling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Sensor endpoint
    pub url: String,
    /// Seconds between the end of one poll and the start of the next
    pub interval_secs: u64,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let defaults = CollectorConfig::default();
        Self {
            url: defaults.sensor_url,
            interval_secs: defaults.interval.as_secs(),
            timeout_ms: defaults.request_timeout.as_millis() as u64,
        }
    }
}

impl SensorConfig {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            sensor_url: self.url.clone(),
            interval: Duration::from_secs(self.interval_secs),
            request_timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

/// Query limits for the readings endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Used when the request carries no `limit` (default: 100)
    pub default_readings_limit: u64,
    /// Optional clamp on `limit`; unbounded when unset
    pub max_readings_limit: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_readings_limit: 100,
            max_readings_limit: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset (default: "info")
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load from the optional file and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from the optional file and the given environment source
    pub fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let env = env
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("cors.allowed_origins");

        let config: AppConfig = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the type system does not
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".to_string()));
        }
        if self.sensor.url.is_empty() {
            return Err(ConfigError::Invalid("sensor.url must be set".to_string()));
        }
        if self.sensor.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sensor.interval_secs must be non-zero".to_string(),
            ));
        }
        if self.sensor.timeout_ms == 0 {
            return Err(ConfigError::Invalid("sensor.timeout_ms must be non-zero".to_string()));
        }
        self.cors.validate()
    }
}
