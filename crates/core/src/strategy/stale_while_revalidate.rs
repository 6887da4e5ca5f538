//! Stale-while-revalidate: answer from cache now, refresh behind the caller.

use super::{Resolution, ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
use crate::cache::{ResponseEntry, hash::body_digest};
use crate::http::Request;
use crate::Error;

const STRATEGY: StrategyKind = StrategyKind::StaleWhileRevalidate;

impl StrategyEngine {
    pub(crate) async fn stale_while_revalidate(
        &self, request: &Request, config: &StrategyConfig,
    ) -> Result<Resolution, Error> {
        let key = request.cache_key();

        let Some(entry) = self.lookup(&config.partition, &key, STRATEGY).await else {
            let response = self.fetch_network(request).await?;
            self.write_back(&config.partition, &key, &response, config.max_age_ms, STRATEGY)
                .await;
            return Ok(Resolution::new(response, ResponseSource::Network));
        };

        let refresh = if self.revalidator.is_stale(&entry, config.max_age_ms) {
            self.spawn_refresh(request, config, entry.clone()).await
        } else {
            None
        };

        Ok(Resolution { response: entry.value, source: ResponseSource::Cache, refresh })
    }

    /// Start a background refresh unless one is already running for this key.
    async fn spawn_refresh(
        &self, request: &Request, config: &StrategyConfig, cached: ResponseEntry,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let flight = format!("{}\n{}", config.partition, cached.key);
        if !self.refreshing.lock().await.insert(flight.clone()) {
            tracing::debug!(key = %cached.key, "background refresh already in flight");
            return None;
        }

        let engine = self.clone();
        let request = request.clone();
        let config = config.clone();
        Some(tokio::spawn(async move {
            engine.refresh(&request, &config, &cached).await;
            engine.refreshing.lock().await.remove(&flight);
        }))
    }

    /// Conditional refetch of `cached`. Failures are logged and dropped.
    async fn refresh(&self, request: &Request, config: &StrategyConfig, cached: &ResponseEntry) {
        let key = cached.key.as_str();
        let conditional = match &cached.etag {
            Some(etag) => request.clone().with_header("if-none-match", etag.clone()),
            None => request.clone(),
        };

        match self.fetcher.fetch(&conditional).await {
            Ok(response) if response.is_not_modified() && cached.etag.is_some() => {
                tracing::debug!(%key, "background refresh not modified, restamping");
                let mut value = cached.value.clone();
                if let Some(etag) = &cached.etag {
                    value = value.with_header("etag", etag.clone());
                }
                self.write_back(&config.partition, key, &value, config.max_age_ms, STRATEGY)
                    .await;
            }
            Ok(response) if response.ok() => {
                let changed = body_digest(&response.body) != body_digest(&cached.value.body);
                self.write_back(&config.partition, key, &response, config.max_age_ms, STRATEGY)
                    .await;
                tracing::debug!(%key, changed, "background refresh stored");
            }
            Ok(response) => {
                tracing::warn!(%key, strategy = %STRATEGY, phase = "background-refresh", status = response.status, "refresh returned non-success, keeping cached entry");
            }
            Err(err) => {
                tracing::warn!(%key, strategy = %STRATEGY, phase = "background-refresh", error = %err, "refresh failed, keeping cached entry");
            }
        }
    }
}
