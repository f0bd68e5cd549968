//! Cross-Origin Resource Sharing policy

use axum::http::{HeaderValue, Method};
use serde::Deserialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::ConfigError;

/// Named CORS policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorsPolicy {
    /// Any origin, method and header. Intended for local dashboards.
    #[default]
    Unrestricted,
    /// Only `allowed_origins`, GET only
    Restricted,
}

/// CORS configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub policy: CorsPolicy,
    /// Origins accepted under [`CorsPolicy::Restricted`]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy == CorsPolicy::Restricted {
            if self.allowed_origins.is_empty() {
                return Err(ConfigError::Invalid(
                    "cors.allowed_origins must not be empty for the restricted policy".to_string(),
                ));
            }
            self.origins()?;
        }
        Ok(())
    }

    /// Build the tower-http layer for this policy
    pub fn layer(&self) -> Result<CorsLayer, ConfigError> {
        let layer = match self.policy {
            CorsPolicy::Unrestricted => CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
            CorsPolicy::Restricted => CorsLayer::new()
                .allow_origin(AllowOrigin::list(self.origins()?))
                .allow_methods([Method::GET])
                .allow_headers(Any),
        };
        Ok(layer)
    }

    fn origins(&self) -> Result<Vec<HeaderValue>, ConfigError> {
        self.allowed_origins
            .iter()
            .map(|origin| {
                if origin == "*" {
                    return Err(ConfigError::Invalid(
                        "wildcard origin needs the unrestricted policy".to_string(),
                    ));
                }
                HeaderValue::from_str(origin)
                    .map_err(|_| ConfigError::Invalid(format!("invalid CORS origin: {:?}", origin)))
            })
            .collect()
    }
}
