// crates/session/src/cache.rs
//! Cache capability seams and the reanalysis invalidation notifier.
//!
//! Cached reads are grouped; a successful reanalysis mutation marks the
//! affected groups stale so the next read refetches. The controller only
//! ever sees the narrow [`InvalidateCache`] capability — there is no
//! globally reachable cache object.

use std::collections::HashMap;
use std::sync::RwLock;

/// Logical groups of cached backend reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadGroup {
    /// `GET /api/brand-history/{brand}` responses.
    BrandHistory,
    /// `GET /api/recent-analyses` responses.
    RecentSessions,
    /// Visibility-over-time series derived from result bundles.
    VisibilityTimeSeries,
}

/// Groups a successful reanalysis makes stale: the new session will
/// appear in history lists and shift every visibility series.
pub const STALE_AFTER_REANALYSIS: [ReadGroup; 3] = [
    ReadGroup::BrandHistory,
    ReadGroup::RecentSessions,
    ReadGroup::VisibilityTimeSeries,
];

/// Mark a whole read group stale. One-shot push, no subscription.
pub trait InvalidateCache: Send + Sync {
    fn invalidate(&self, group: ReadGroup);
}

/// Read/write cached values by group and key.
pub trait CacheStore: InvalidateCache {
    fn read(&self, group: ReadGroup, key: &str) -> Option<serde_json::Value>;
    fn write(&self, group: ReadGroup, key: &str, value: serde_json::Value);
}

/// In-process cache keyed by group then key. Invalidation drops the
/// entire group.
#[derive(Debug, Default)]
pub struct MemoryCache {
    groups: RwLock<HashMap<ReadGroup, HashMap<String, serde_json::Value>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ReadGroup, HashMap<String, serde_json::Value>>> {
        match self.groups.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("cache lock poisoned");
                poisoned.into_inner()
            }
        }
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ReadGroup, HashMap<String, serde_json::Value>>> {
        match self.groups.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("cache lock poisoned");
                poisoned.into_inner()
            }
        }
    }
}

impl InvalidateCache for MemoryCache {
    fn invalidate(&self, group: ReadGroup) {
        if self.lock_write().remove(&group).is_some() {
            tracing::debug!(?group, "cache group invalidated");
        }
    }
}

impl CacheStore for MemoryCache {
    fn read(&self, group: ReadGroup, key: &str) -> Option<serde_json::Value> {
        self.lock_read().get(&group)?.get(key).cloned()
    }

    fn write(&self, group: ReadGroup, key: &str, value: serde_json::Value) {
        self.lock_write()
            .entry(group)
            .or_default()
            .insert(key.to_string(), value);
    }
}

/// For callers that keep no cache.
#[derive(Debug, Default)]
pub struct NoopCache;

impl InvalidateCache for NoopCache {
    fn invalidate(&self, _group: ReadGroup) {}
}
