//! Cache entries and freshness.

use serde::{Deserialize, Serialize};

/// A value stored under a key with its write time and validity window.
///
/// Entries are replaced whole; nothing mutates an entry in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub key: String,
    pub value: T,
    /// Write time in epoch milliseconds. `None` means unknown and is never fresh.
    pub stored_at: Option<u64>,
    pub ttl_ms: u64,
    /// Validator from the origin, used for conditional revalidation.
    pub etag: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn new(key: impl Into<String>, value: T, stored_at: u64, ttl_ms: u64) -> Self {
        Self { key: key.into(), value, stored_at: Some(stored_at), ttl_ms, etag: None }
    }

    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Milliseconds since the entry was written, if known.
    pub fn age_ms(&self, now_ms: u64) -> Option<u64> {
        self.stored_at.map(|stored_at| now_ms.saturating_sub(stored_at))
    }

    /// Fresh while `now - stored_at < ttl_ms`.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.age_ms(now_ms).is_some_and(|age| age < self.ttl_ms)
    }
}
