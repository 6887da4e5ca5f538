//! Cache-first: any cached entry wins, regardless of age.

use super::{Resolution, ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
use crate::http::Request;
use crate::Error;

impl StrategyEngine {
    pub(crate) async fn cache_first(&self, request: &Request, config: &StrategyConfig) -> Result<Resolution, Error> {
        let key = request.cache_key();

        if let Some(entry) = self.lookup(&config.partition, &key, StrategyKind::CacheFirst).await {
            return Ok(Resolution::new(entry.value, ResponseSource::Cache));
        }

        let response = self.fetch_network(request).await?;
        self.write_back(&config.partition, &key, &response, config.max_age_ms, StrategyKind::CacheFirst)
            .await;

        Ok(Resolution::new(response, ResponseSource::Network))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::cache::{CacheEntry, CacheRegistry};
    use crate::clock::ManualClock;
    use crate::http::{Request, Response};
    use crate::strategy::{ResponseSource, StrategyConfig, StrategyEngine, StrategyKind};
    use crate::testing::{FailingStore, ScriptedFetcher, url};

    fn setup() -> (StrategyEngine, CacheRegistry, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let registry = CacheRegistry::in_memory("app");
        let engine = StrategyEngine::new(registry.clone(), fetcher.clone(), Arc::new(ManualClock::new(10_000_000)));
        (engine, registry, fetcher)
    }

    fn config() -> StrategyConfig {
        StrategyConfig::new(StrategyKind::CacheFirst, 1_000, "static")
    }

    #[tokio::test]
    async fn test_hit_never_touches_network() {
        let (engine, registry, fetcher) = setup();
        let request = Request::get(url("/app.js"));
        // written long ago, far beyond max age
        registry
            .put("static", CacheEntry::new(request.cache_key(), Response::new(200, "cached"), 0, 1_000))
            .await
            .unwrap();

        let resolution = engine.resolve(&request, &config()).await.unwrap();
        assert_eq!(resolution.response.body, "cached");
        assert_eq!(resolution.source, ResponseSource::Cache);
        assert!(resolution.refresh.is_none());
        assert_eq!(fetcher.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let (engine, registry, fetcher) = setup();
        let request = Request::get(url("/app.js"));
        fetcher.respond(&url("/app.js"), Response::new(200, "fresh"));

        let resolution = engine.resolve(&request, &config()).await.unwrap();
        assert_eq!(resolution.response.body, "fresh");
        assert_eq!(resolution.source, ResponseSource::Network);

        let stored = registry.match_entry("static", &request.cache_key()).await.unwrap().unwrap();
        assert_eq!(stored.value.body, "fresh");
        assert_eq!(stored.stored_at, Some(10_000_000));
    }

    #[tokio::test]
    async fn test_miss_with_network_failure_propagates() {
        let (engine, _registry, fetcher) = setup();
        fetcher.fail(&url("/app.js"), "offline");

        let result = engine.resolve(&Request::get(url("/app.js")), &config()).await;
        assert!(matches!(result, Err(crate::Error::Network(_))));
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_cached() {
        let (engine, registry, fetcher) = setup();
        let request = Request::get(url("/missing.js"));
        fetcher.respond(&url("/missing.js"), Response::new(404, "nope"));

        let result = engine.resolve(&request, &config()).await;
        assert!(matches!(result, Err(crate::Error::HttpError(_))));
        assert!(registry.match_entry("static", &request.cache_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_still_serves_network() {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let registry = CacheRegistry::new(Arc::new(FailingStore), "app");
        let engine = StrategyEngine::new(registry, fetcher.clone(), Arc::new(ManualClock::new(0)));
        fetcher.respond(&url("/app.js"), Response::new(200, "net"));

        let resolution = engine.resolve(&Request::get(url("/app.js")), &config()).await.unwrap();
        assert_eq!(resolution.response.body, "net");
        assert_eq!(resolution.source, ResponseSource::Network);
    }
}
