//! Bounded, TTL-aware memo of resolved names.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use namesys_common::Path;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    path: Path,
    expires_at: Instant,
}

/// Least-recently-used cache of `key -> resolved path`, with a deadline per entry.
///
/// Expired entries are treated as misses and dropped when looked up. A capacity of
/// zero disables the cache: every `get` misses and every `set` is a no-op.
/// Safe for concurrent use; every operation holds the lock only for its own duration.
#[derive(Debug)]
pub struct ResolverCache {
    entries: Option<Mutex<LruCache<String, CacheEntry>>>,
}

impl ResolverCache {
    /// Cache holding at most `capacity` names.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Whether the cache stores anything at all.
    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    /// The cached path for `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Path> {
        let mut entries = self
            .entries
            .as_ref()?
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let entry = entries.get(key)?;
        if Instant::now() < entry.expires_at {
            return Some(entry.path.clone());
        }

        entries.pop(key);
        None
    }

    /// Remember `path` for `key` during `ttl`. A zero `ttl` stores nothing.
    pub fn set(&self, key: &str, path: Path, ttl: Duration) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        if ttl.is_zero() {
            return;
        }
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };

        entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .put(key.to_string(), CacheEntry { path, expires_at });
    }

    /// Number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map(|entries| {
                entries
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len()
            })
            .unwrap_or_default()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
