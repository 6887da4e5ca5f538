//! Staleness decisions for cached responses.

use std::sync::Arc;

use crate::cache::ResponseEntry;
use crate::clock::Clock;

/// Header stamped on responses written by the strategy engine, holding the
/// write time in epoch milliseconds.
pub const CACHED_AT_HEADER: &str = "sw-cached-at";

/// Write time of `entry`: metadata first, then the stamped header.
pub fn stored_at(entry: &ResponseEntry) -> Option<u64> {
    entry
        .stored_at
        .or_else(|| entry.value.header(CACHED_AT_HEADER).and_then(|v| v.trim().parse().ok()))
}

/// `true` when the write time is unknown, `max_age_ms` is zero, or the entry
/// is older than `max_age_ms`.
pub fn is_stale_at(entry: &ResponseEntry, max_age_ms: u64, now_ms: u64) -> bool {
    match stored_at(entry) {
        Some(written) => max_age_ms == 0 || now_ms.saturating_sub(written) > max_age_ms,
        None => true,
    }
}

/// Staleness predicate bound to a clock.
#[derive(Debug, Clone)]
pub struct Revalidator {
    clock: Arc<dyn Clock>,
}

impl Revalidator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn is_stale(&self, entry: &ResponseEntry, max_age_ms: u64) -> bool {
        is_stale_at(entry, max_age_ms, self.clock.now_ms())
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
