//! Application-level query cache over the TTL store.
//!
//! `fetch` returns fresh data or loads it, `progressive` answers from cache
//! at once and reloads stale data behind the caller. Loaders run under a
//! timeout and at most one loader runs per key at a time.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use swcache_core::{Clock, Error, Freshness, SystemClock, TtlStore};

/// Default loader timeout.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Value returned by [`QueryCache::progressive`].
#[derive(Debug)]
pub struct Progress<V> {
    pub value: V,
    /// `true` when `value` came from an expired entry.
    pub stale: bool,
    /// Background reload started for a stale value.
    pub reload: Option<JoinHandle<()>>,
}

/// Keyed query cache. Clones share entries and in-flight loads.
#[derive(Debug, Clone)]
pub struct QueryCache<V> {
    store: TtlStore<V>,
    loading: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    timeout: Duration,
}

impl<V: Clone + Send + Sync + 'static> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock), DEFAULT_QUERY_TIMEOUT)
    }
}

impl<V: Clone + Send + Sync + 'static> QueryCache<V> {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self { store: TtlStore::new(clock), loading: Arc::default(), timeout }
    }

    pub fn store(&self) -> &TtlStore<V> {
        &self.store
    }

    /// Fresh cached value, or the loader's result stored for `ttl_ms`.
    ///
    /// # Errors
    ///
    /// Loader errors are returned as is; a loader exceeding the timeout
    /// yields `Error::FetchTimeout`.
    pub async fn fetch<F, Fut>(&self, key: &str, ttl_ms: u64, loader: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        if let Some(value) = self.store.get(key).await {
            tracing::debug!(%key, "query cache hit");
            return Ok(value);
        }
        self.load(key, ttl_ms, loader, true).await
    }

    /// Cached value right away, fresh or stale; stale values are reloaded in
    /// the background. Absent values load like [`QueryCache::fetch`].
    pub async fn progressive<F, Fut>(&self, key: &str, ttl_ms: u64, loader: F) -> Result<Progress<V>, Error>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, Error>> + Send + 'static,
    {
        match self.store.peek(key).await {
            Some(Freshness::Fresh(value)) => Ok(Progress { value, stale: false, reload: None }),
            Some(Freshness::Stale(value)) => {
                let cache = self.clone();
                let key = key.to_string();
                let reload = tokio::spawn(async move {
                    if let Err(err) = cache.load(&key, ttl_ms, loader, false).await {
                        tracing::warn!(%key, phase = "background-reload", error = %err, "query reload failed, keeping stale value");
                    }
                });
                Ok(Progress { value, stale: true, reload: Some(reload) })
            }
            None => {
                let value = self.load(key, ttl_ms, loader, true).await?;
                Ok(Progress { value, stale: false, reload: None })
            }
        }
    }

    /// Warm `key` without using the value.
    pub async fn prefetch<F, Fut>(&self, key: &str, ttl_ms: u64, loader: F) -> Result<(), Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        self.fetch(key, ttl_ms, loader).await.map(|_| ())
    }

    /// Drop one key, or everything when `key` is `None`.
    pub async fn invalidate(&self, key: Option<&str>) {
        self.store.invalidate(key).await;
    }

    /// Run `loader` while holding the per-key lock and store its result.
    ///
    /// With `reuse_fresh`, a value stored by a concurrent load while this call
    /// waited for the lock is returned instead of loading again.
    async fn load<F, Fut>(&self, key: &str, ttl_ms: u64, loader: F, reuse_fresh: bool) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        let lock = self
            .loading
            .lock()
            .await
            .entry(key.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            match self.store.get(key).await {
                Some(value) if reuse_fresh => Ok(value),
                _ => self.run_loader(key, ttl_ms, loader).await,
            }
        };

        let mut loading = self.loading.lock().await;
        if Arc::strong_count(&lock) == 2 {
            loading.remove(key);
        }
        result
    }

    async fn run_loader<F, Fut>(&self, key: &str, ttl_ms: u64, loader: F) -> Result<V, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, Error>>,
    {
        let value = tokio::time::timeout(self.timeout, loader())
            .await
            .map_err(|_| Error::FetchTimeout(format!("query {key} exceeded {}ms", self.timeout.as_millis())))??;
        self.store.set(key, value.clone(), ttl_ms).await;
        tracing::debug!(%key, ttl_ms, "query cache stored");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swcache_core::ManualClock;

    fn cache() -> (QueryCache<String>, ManualClock) {
        let clock = ManualClock::new(0);
        (QueryCache::new(Arc::new(clock.clone()), Duration::from_millis(200)), clock)
    }

    #[tokio::test]
    async fn test_fetch_caches_until_expiry() {
        let (cache, clock) = cache();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("profile".to_string())
        };

        assert_eq!(cache.fetch("user:1", 1_000, load).await.unwrap(), "profile");
        assert_eq!(cache.fetch("user:1", 1_000, load).await.unwrap(), "profile");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(1_001);
        cache.fetch("user:1", 1_000, load).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_load() {
        let (cache, _clock) = cache();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok("v".to_string())
        };

        let (a, b) = tokio::join!(cache.fetch("k", 1_000, load), cache.fetch("k", 1_000, load));
        assert_eq!(a.unwrap(), "v");
        assert_eq!(b.unwrap(), "v");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loader_timeout_is_network_failure() {
        let (cache, _clock) = cache();
        let err = cache
            .fetch("slow", 1_000, || std::future::pending::<Result<String, Error>>())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FetchTimeout(_)));
        assert!(err.is_network_failure());
        assert!(cache.store().is_empty().await);
    }

    #[tokio::test]
    async fn test_loader_error_not_cached() {
        let (cache, _clock) = cache();
        let err = cache
            .fetch("k", 1_000, || async { Err::<String, _>(Error::Network("offline".into())) })
            .await;
        assert!(err.is_err());
        assert_eq!(cache.fetch("k", 1_000, || async { Ok("later".to_string()) }).await.unwrap(), "later");
    }

    #[tokio::test]
    async fn test_progressive_serves_stale_then_reloads() {
        let (cache, clock) = cache();
        cache.store().set("feed", "old".to_string(), 100).await;
        clock.advance(500);

        let progress = cache.progressive("feed", 100, || async { Ok("new".to_string()) }).await.unwrap();
        assert_eq!(progress.value, "old");
        assert!(progress.stale);

        progress.reload.unwrap().await.unwrap();
        assert_eq!(cache.store().get("feed").await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_progressive_failed_reload_keeps_stale() {
        let (cache, clock) = cache();
        cache.store().set("feed", "old".to_string(), 100).await;
        clock.advance(500);

        let progress = cache
            .progressive("feed", 100, || async { Err(Error::Network("offline".into())) })
            .await
            .unwrap();
        progress.reload.unwrap().await.unwrap();
        assert_eq!(cache.store().peek("feed").await, Some(Freshness::Stale("old".to_string())));
    }

    #[tokio::test]
    async fn test_progressive_fresh_and_absent() {
        let (cache, _clock) = cache();
        let first = cache.progressive("k", 1_000, || async { Ok("loaded".to_string()) }).await.unwrap();
        assert_eq!(first.value, "loaded");
        assert!(first.reload.is_none());

        let second = cache.progressive("k", 1_000, || async { Ok("unused".to_string()) }).await.unwrap();
        assert_eq!(second.value, "loaded");
        assert!(!second.stale);
    }

    #[tokio::test]
    async fn test_prefetch_and_invalidate() {
        let (cache, _clock) = cache();
        cache.prefetch("a", 1_000, || async { Ok("1".to_string()) }).await.unwrap();
        cache.prefetch("b", 1_000, || async { Ok("2".to_string()) }).await.unwrap();
        assert_eq!(cache.store().len().await, 2);

        cache.invalidate(Some("a")).await;
        assert_eq!(cache.store().get("a").await, None);
        cache.invalidate(None).await;
        assert!(cache.store().is_empty().await);
    }
}
