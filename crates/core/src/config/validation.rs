//! Configuration validation rules.
//!
//! Checks `AppConfig` values after they have been loaded from environment,
//! files, or defaults.

use url::Url;

use crate::config::AppConfig;
use crate::router::Pattern;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

fn check_path(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with('/') { Ok(()) } else { Err(invalid(field, "must start with '/'")) }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_name.is_empty() || self.app_name.chars().any(char::is_whitespace) {
            return Err(invalid("app_name", "must be non-empty without whitespace"));
        }

        let numeric = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit());
        if !self.version.split('.').all(numeric) {
            return Err(invalid("version", "must be dot-separated numbers such as 1.2.0"));
        }

        Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;
        if let Some(auth_origin) = &self.auth_origin {
            Url::parse(auth_origin).map_err(|e| invalid("auth_origin", e.to_string()))?;
        }

        check_path("manifest_path", &self.manifest_path)?;
        check_path("offline_document", &self.offline_document)?;
        check_path("fallback_asset", &self.fallback_asset)?;
        check_path("image_path_prefix", &self.image_path_prefix)?;

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }
        if self.query_timeout_ms < 100 {
            return Err(invalid("query_timeout_ms", "must be at least 100ms"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        for (index, route) in self.routes.iter().enumerate() {
            Pattern::regex(&route.pattern).map_err(|e| invalid(&format!("routes[{index}].pattern"), e.to_string()))?;
            if route.partition.is_empty() {
                return Err(invalid(&format!("routes[{index}].partition"), "must not be empty"));
            }
        }

        if self.routes.is_empty() {
            tracing::warn!("no routes configured; every request uses the default network-first policy");
        }

        Ok(())
    }
}
