//! Request classification into a strategy and partition.
//!
//! Rules are evaluated in table order and the first match wins. Requests that
//! match nothing get the router's default network-first config.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::http::{Destination, Request};
use crate::strategy::{StrategyConfig, StrategyKind};
use crate::Error;

/// Partition used by the default route unless overridden.
pub const DEFAULT_PARTITION: &str = "dynamic";

/// Predicate over a request.
#[derive(Clone)]
pub enum Pattern {
    /// Matches the URL path or the full URL.
    Regex(Regex),
    /// Matches paths starting with the prefix.
    PathPrefix(String),
    Destination(Destination),
    Predicate(Arc<dyn Fn(&Request) -> bool + Send + Sync>),
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
            Pattern::PathPrefix(prefix) => f.debug_tuple("PathPrefix").field(prefix).finish(),
            Pattern::Destination(destination) => f.debug_tuple("Destination").field(destination).finish(),
            Pattern::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl Pattern {
    pub fn regex(pattern: &str) -> Result<Self, Error> {
        Regex::new(pattern)
            .map(Pattern::Regex)
            .map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))
    }

    pub fn matches(&self, request: &Request) -> bool {
        match self {
            Pattern::Regex(re) => re.is_match(request.url.path()) || re.is_match(request.url.as_str()),
            Pattern::PathPrefix(prefix) => request.url.path().starts_with(prefix.as_str()),
            Pattern::Destination(destination) => request.destination == *destination,
            Pattern::Predicate(predicate) => predicate(request),
        }
    }
}

/// One row of the strategy table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub pattern: Pattern,
    pub config: StrategyConfig,
}

/// Serializable route row, as found in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouteSpec {
    /// Regular expression matched against the path or full URL.
    pub pattern: String,
    pub strategy: StrategyKind,
    pub max_age_ms: u64,
    /// Partition name, or logical suffix when qualified by the worker.
    pub partition: String,
}

impl RouteSpec {
    pub fn new(pattern: &str, strategy: StrategyKind, max_age_ms: u64, partition: &str) -> Self {
        Self { pattern: pattern.into(), strategy, max_age_ms, partition: partition.into() }
    }

    /// Compile this row, mapping the partition name through `qualify`.
    pub fn compile(&self, qualify: impl Fn(&str) -> String) -> Result<RouteRule, Error> {
        Ok(RouteRule {
            pattern: Pattern::regex(&self.pattern)?,
            config: StrategyConfig::new(self.strategy, self.max_age_ms, qualify(&self.partition)),
        })
    }
}

/// Ordered strategy table with a default.
#[derive(Debug, Clone)]
pub struct Router {
    rules: Vec<RouteRule>,
    default: StrategyConfig,
}

impl Router {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules, default: StrategyConfig::new(StrategyKind::NetworkFirst, 0, DEFAULT_PARTITION) }
    }

    /// Build from configuration rows, partition names used verbatim.
    pub fn from_specs(specs: &[RouteSpec]) -> Result<Self, Error> {
        let rules = specs
            .iter()
            .map(|spec| spec.compile(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    pub fn with_default(mut self, default: StrategyConfig) -> Self {
        self.default = default;
        self
    }

    /// First matching rule's config, or the default.
    pub fn classify(&self, request: &Request) -> &StrategyConfig {
        let config = self
            .rules
            .iter()
            .find(|rule| rule.pattern.matches(request))
            .map(|rule| &rule.config)
            .unwrap_or(&self.default);
        tracing::debug!(url = %request.url, strategy = %config.kind, partition = %config.partition, "classified request");
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR_MS: u64 = 365 * 24 * 60 * 60 * 1000;
    const FIVE_MIN_MS: u64 = 5 * 60 * 1000;

    fn table() -> Router {
        Router::from_specs(&[
            RouteSpec::new(r"\.(js|css)$", StrategyKind::CacheFirst, YEAR_MS, "static"),
            RouteSpec::new(r"/api/", StrategyKind::StaleWhileRevalidate, FIVE_MIN_MS, "api"),
        ])
        .unwrap()
    }

    fn request(url: &str) -> Request {
        Request::parse(url).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let router = table();
        let config = router.classify(&request("https://example.com/api/bundle.js"));
        assert_eq!(config.kind, StrategyKind::CacheFirst);
        assert_eq!(config.partition, "static");
    }

    #[test]
    fn test_path_match_ignores_query() {
        let router = table();
        let config = router.classify(&request("https://example.com/app.js?v=3"));
        assert_eq!(config.kind, StrategyKind::CacheFirst);
    }

    #[test]
    fn test_full_url_match() {
        let router = Router::from_specs(&[RouteSpec::new(
            r"^https://cdn\.example\.com/",
            StrategyKind::CacheFirst,
            YEAR_MS,
            "cdn",
        )])
        .unwrap();
        assert_eq!(router.classify(&request("https://cdn.example.com/font.woff2")).partition, "cdn");
    }

    #[test]
    fn test_unmatched_gets_default() {
        let router = table();
        let config = router.classify(&request("https://example.com/about"));
        assert_eq!(config.kind, StrategyKind::NetworkFirst);
        assert_eq!(config.partition, DEFAULT_PARTITION);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let router = table();
        let req = request("https://example.com/api/data");
        let first = router.classify(&req).clone();
        for _ in 0..10 {
            assert_eq!(router.classify(&req), &first);
        }
        assert_eq!(first.kind, StrategyKind::StaleWhileRevalidate);
        assert_eq!(first.max_age_ms, FIVE_MIN_MS);
    }

    #[test]
    fn test_destination_and_prefix_patterns() {
        let router = Router::new(vec![
            RouteRule {
                pattern: Pattern::Destination(Destination::Image),
                config: StrategyConfig::new(StrategyKind::CacheFirst, YEAR_MS, "images"),
            },
            RouteRule {
                pattern: Pattern::PathPrefix("/uploads/".into()),
                config: StrategyConfig::new(StrategyKind::CacheFirst, YEAR_MS, "uploads"),
            },
        ]);

        let image = request("https://example.com/logo").with_destination(Destination::Image);
        assert_eq!(router.classify(&image).partition, "images");
        assert_eq!(router.classify(&request("https://example.com/uploads/a.bin")).partition, "uploads");
    }

    #[test]
    fn test_predicate_pattern() {
        let router = Router::new(vec![RouteRule {
            pattern: Pattern::Predicate(Arc::new(|req: &Request| req.url.query().is_some())),
            config: StrategyConfig::new(StrategyKind::NetworkFirst, 0, "queries"),
        }]);
        assert_eq!(router.classify(&request("https://example.com/?q=1")).partition, "queries");
        assert_eq!(router.classify(&request("https://example.com/")).partition, DEFAULT_PARTITION);
    }

    #[test]
    fn test_invalid_regex() {
        let result = Router::from_specs(&[RouteSpec::new("(", StrategyKind::CacheFirst, 0, "x")]);
        assert!(matches!(result, Err(Error::InvalidPattern(_))));
    }

    #[test]
    fn test_custom_default() {
        let router = table().with_default(StrategyConfig::new(StrategyKind::NetworkFirst, 0, "app-v1-dynamic"));
        assert_eq!(router.classify(&request("https://example.com/")).partition, "app-v1-dynamic");
    }
}
