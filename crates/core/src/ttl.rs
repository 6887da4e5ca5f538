//! In-memory key/value store with per-entry expiry.
//!
//! Expiry is lazy: expired entries stay in the map until overwritten,
//! invalidated or purged, but are never returned as fresh.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::CacheEntry;
use crate::clock::{Clock, SystemClock};

/// Result of [`TtlStore::peek`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Freshness<V> {
    Fresh(V),
    Stale(V),
}

impl<V> Freshness<V> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Freshness::Fresh(_))
    }

    pub fn into_value(self) -> V {
        match self {
            Freshness::Fresh(v) | Freshness::Stale(v) => v,
        }
    }
}

/// Typed TTL store. Clones share the same entries.
#[derive(Clone)]
pub struct TtlStore<V> {
    entries: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    clock: Arc<dyn Clock>,
}

impl<V> fmt::Debug for TtlStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlStore").field("clock", &self.clock).finish_non_exhaustive()
    }
}

impl<V: Clone> Default for TtlStore<V> {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl<V: Clone> TtlStore<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), clock }
    }

    /// Fresh value for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Value for `key` labelled fresh or stale.
    pub async fn peek(&self, key: &str) -> Option<Freshness<V>> {
        let now = self.clock.now_ms();
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| {
            if entry.is_fresh(now) {
                Freshness::Fresh(entry.value.clone())
            } else {
                Freshness::Stale(entry.value.clone())
            }
        })
    }

    /// Unconditional overwrite stamped with the current time.
    pub async fn set(&self, key: &str, value: V, ttl_ms: u64) {
        let entry = CacheEntry::new(key, value, self.clock.now_ms(), ttl_ms);
        self.entries.write().await.insert(key.to_string(), entry);
    }

    /// Remove one key, or everything when `key` is `None`.
    pub async fn invalidate(&self, key: Option<&str>) {
        let mut entries = self.entries.write().await;
        match key {
            Some(key) => {
                entries.remove(key);
            }
            None => entries.clear(),
        }
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store_at(t0: u64) -> (TtlStore<String>, ManualClock) {
        let clock = ManualClock::new(t0);
        (TtlStore::new(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_expiry_boundary() {
        let (store, clock) = store_at(50_000);
        store.set("k", "v".to_string(), 1_000).await;

        clock.set(50_999);
        assert_eq!(store.get("k").await.as_deref(), Some("v"));

        clock.set(51_001);
        assert_eq!(store.get("k").await, None);
        assert_eq!(store.peek("k").await, Some(Freshness::Stale("v".to_string())));
    }

    #[tokio::test]
    async fn test_set_overwrites_and_restamps() {
        let (store, clock) = store_at(0);
        store.set("k", "old".to_string(), 100).await;
        clock.advance(150);
        store.set("k", "new".to_string(), 100).await;

        assert_eq!(store.get("k").await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_invalidate_one_and_all() {
        let (store, _clock) = store_at(0);
        store.set("a", "1".to_string(), 1_000).await;
        store.set("b", "2".to_string(), 1_000).await;

        store.invalidate(Some("a")).await;
        assert_eq!(store.get("a").await, None);
        assert_eq!(store.get("b").await.as_deref(), Some("2"));

        store.invalidate(None).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_never_fresh() {
        let (store, _clock) = store_at(0);
        store.set("k", "v".to_string(), 0).await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_at(0);
        store.set("short", "1".to_string(), 10).await;
        store.set("long", "2".to_string(), 10_000).await;
        clock.advance(100);

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.peek("short").await.is_none());
    }
}
