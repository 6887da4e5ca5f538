//! Fetch strategies over a partition and a network fetcher.
//!
//! Three policies decide how cached state and the network combine for one
//! request:
//!
//! - **cache-first**: serve any cached entry, fetch and store only on a miss
//! - **network-first**: fetch and store, fall back to the cache when the
//!   network fails
//! - **stale-while-revalidate**: serve the cached entry immediately and
//!   refresh it in the background once it is older than `max_age_ms`
//!
//! Storage failures never fail a request: reads degrade to a miss and
//! write-backs are logged and skipped.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::cache::{CacheEntry, CacheRegistry, ResponseEntry};
use crate::clock::Clock;
use crate::http::{Fetcher, Request, Response};
use crate::revalidate::{CACHED_AT_HEADER, Revalidator};
use crate::Error;

/// Resolution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::CacheFirst => "cache-first",
            StrategyKind::NetworkFirst => "network-first",
            StrategyKind::StaleWhileRevalidate => "stale-while-revalidate",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy, max age and target partition for a class of requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    pub max_age_ms: u64,
    pub partition: String,
}

impl StrategyConfig {
    pub fn new(kind: StrategyKind, max_age_ms: u64, partition: impl Into<String>) -> Self {
        Self { kind, max_age_ms, partition: partition.into() }
    }
}

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Network failed, cached entry served instead.
    CacheFallback,
    /// Navigation failed, offline document served instead.
    OfflineFallback,
}

/// Outcome of resolving one request.
#[derive(Debug)]
pub struct Resolution {
    pub response: Response,
    pub source: ResponseSource,
    /// Background refresh started by stale-while-revalidate, if any.
    pub refresh: Option<JoinHandle<()>>,
}

impl Resolution {
    pub fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source, refresh: None }
    }
}

/// Executes strategies against a registry and a fetcher.
///
/// Cheap to clone; clones share the in-flight refresh set.
#[derive(Clone)]
pub struct StrategyEngine {
    registry: CacheRegistry,
    fetcher: Arc<dyn Fetcher>,
    revalidator: Revalidator,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl fmt::Debug for StrategyEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyEngine")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl StrategyEngine {
    pub fn new(registry: CacheRegistry, fetcher: Arc<dyn Fetcher>, clock: Arc<dyn Clock>) -> Self {
        Self { registry, fetcher, revalidator: Revalidator::new(clock), refreshing: Arc::default() }
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }

    /// Resolve `request` with the policy in `config`.
    pub async fn resolve(&self, request: &Request, config: &StrategyConfig) -> Result<Resolution, Error> {
        match config.kind {
            StrategyKind::CacheFirst => self.cache_first(request, config).await,
            StrategyKind::NetworkFirst => self.network_first(request, config).await,
            StrategyKind::StaleWhileRevalidate => self.stale_while_revalidate(request, config).await,
        }
    }

    /// Cached entry, treating storage errors as a miss.
    pub(crate) async fn lookup(&self, partition: &str, key: &str, strategy: StrategyKind) -> Option<ResponseEntry> {
        match self.registry.match_entry(partition, key).await {
            Ok(entry) => {
                tracing::debug!(%key, %partition, %strategy, hit = entry.is_some(), "cache lookup");
                entry
            }
            Err(err) => {
                tracing::warn!(%key, %partition, %strategy, phase = "lookup", error = %err, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Network fetch where any non-2xx status is a failure.
    pub(crate) async fn fetch_network(&self, request: &Request) -> Result<Response, Error> {
        let response = self.fetcher.fetch(request).await?;
        if !response.ok() {
            return Err(Error::HttpError(format!("status {} for {}", response.status, request.url)));
        }
        Ok(response)
    }

    /// Store `response` under `key`, stamped with the current time.
    ///
    /// Failures are logged; the caller still has its response.
    pub(crate) async fn write_back(
        &self, partition: &str, key: &str, response: &Response, max_age_ms: u64, strategy: StrategyKind,
    ) {
        let now = self.revalidator.now_ms();
        let stamped = response.clone().with_header(CACHED_AT_HEADER, now.to_string());
        let etag = response.etag().map(str::to_string);
        let entry = CacheEntry::new(key, stamped, now, max_age_ms).with_etag(etag);

        if let Err(err) = self.registry.put(partition, entry).await {
            tracing::warn!(%key, %partition, %strategy, phase = "write-back", error = %err, "cache write failed, serving uncached");
        }
    }
}
