//! Application configuration with layered loading.
//!
//! Configuration is loaded with figment from three layers:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::router::RouteSpec;
use crate::strategy::StrategyKind;

mod validation;

pub use validation::ConfigError;

const YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;
const FIVE_MIN_MS: u64 = 5 * 60 * 1000;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name, first component of every partition name.
    ///
    /// Set via SWCACHE_APP_NAME environment variable.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Deployed version; partitions are named `{app_name}-v{version}-*`.
    ///
    /// Set via SWCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin that relative paths (manifest, precache list) resolve against.
    #[serde(default = "default_origin")]
    pub origin: String,

    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Document served when a navigation fails.
    #[serde(default = "default_offline_document")]
    pub offline_document: String,

    /// Asset added to the base precache list when the manifest is unusable.
    #[serde(default = "default_fallback_asset")]
    pub fallback_asset: String,

    /// Authentication backend origin; requests to it are never cached.
    ///
    /// Set via SWCACHE_AUTH_ORIGIN environment variable.
    #[serde(default)]
    pub auth_origin: Option<String>,

    /// Path prefix of uploaded images served cache-first.
    #[serde(default = "default_image_path_prefix")]
    pub image_path_prefix: String,

    /// Activate right after install instead of waiting for old clients.
    #[serde(default = "default_true")]
    pub skip_waiting: bool,

    /// Path to SQLite partition database. In-memory storage when unset.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Loader timeout for the application query cache.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Ordered strategy table. Partitions are suffixes such as `static`.
    #[serde(default = "default_routes")]
    pub routes: Vec<RouteSpec>,
}

fn default_app_name() -> String {
    "app".into()
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_manifest_path() -> String {
    "/manifest.json".into()
}

fn default_offline_document() -> String {
    "/index.html".into()
}

fn default_fallback_asset() -> String {
    "/icons/icon-192x192.png".into()
}

fn default_image_path_prefix() -> String {
    "/uploads/".into()
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_query_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_routes() -> Vec<RouteSpec> {
    vec![
        RouteSpec::new(r"\.(js|css|woff2?|ttf)$", StrategyKind::CacheFirst, YEAR_MS, "static"),
        RouteSpec::new(r"/api/", StrategyKind::StaleWhileRevalidate, FIVE_MIN_MS, "api"),
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            version: default_version(),
            origin: default_origin(),
            manifest_path: default_manifest_path(),
            offline_document: default_offline_document(),
            fallback_asset: default_fallback_asset(),
            auth_origin: None,
            image_path_prefix: default_image_path_prefix(),
            skip_waiting: true,
            db_path: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            query_timeout_ms: default_query_timeout_ms(),
            routes: default_routes(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
