//! In-memory TTL cache for operation results.
//!
//! Avoids re-issuing identical outbound calls within a freshness window
//! (five minutes unless told otherwise). Entries are keyed by
//! `(operation, canonical arguments)` via [`CacheKey`] and expire lazily:
//! an expired entry is dropped the next time it is looked up, or by
//! [`ResultCache::purge_expired`] if a sweeper runs.
//!
//! The map sits behind a single mutex. Every method is synchronous, does no
//! I/O and never fails; a poisoned lock is recovered rather than propagated.

use super::key::{CacheKey, KeyPolicy};
use crate::result::ToolResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default freshness window.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ToolResult,
    created_at: Instant,
    ttl: Duration,
    /// Insertion order, for oldest-first eviction.
    seq: u64,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < self.ttl
    }
}

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped because they expired.
    pub expired: u64,
    /// Entries dropped to stay under `max_entries`.
    pub evicted: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    next_seq: u64,
    stats: CacheStats,
}

/// Process-wide result cache. Share it behind an `Arc`.
#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<Inner>,
    default_ttl: Duration,
    /// Maximum number of entries before eviction. `None` means unbounded.
    max_entries: Option<usize>,
    key_policy: KeyPolicy,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultCache {
    /// Unbounded cache with the five-minute default TTL.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            default_ttl: DEFAULT_TTL,
            max_entries: None,
            key_policy: KeyPolicy::default(),
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Bound the number of entries; the oldest-inserted entry is evicted on
    /// overflow. `0` is clamped to `1`: the latest result is always kept.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max.max(1));
        self
    }

    pub fn with_key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Lazily created cache shared by the whole process.
    pub fn global() -> &'static ResultCache {
        static GLOBAL: OnceLock<ResultCache> = OnceLock::new();
        GLOBAL.get_or_init(ResultCache::new)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn key_policy(&self) -> &KeyPolicy {
        &self.key_policy
    }

    /// The key this cache uses for `(operation, args)`.
    pub fn key_for(&self, operation: &str, args: &Value) -> CacheKey {
        CacheKey::with_policy(operation, args, &self.key_policy)
    }

    /// Look up a fresh result. Missing and expired entries are both misses.
    pub fn get(&self, operation: &str, args: &Value) -> Option<ToolResult> {
        let key = self.key_for(operation, args);
        self.get_key(&key)
    }

    /// Look up by a precomputed key.
    pub fn get_key(&self, key: &CacheKey) -> Option<ToolResult> {
        let now = Instant::now();
        let mut inner = self.lock();
        let (fresh, expired) = match inner.entries.get(key) {
            Some(entry) if entry.is_valid(now) => (Some(entry.value.clone()), false),
            Some(_) => (None, true),
            None => (None, false),
        };
        if expired {
            inner.entries.remove(key);
            inner.stats.expired += 1;
            trace!(key = %key, "cache entry expired");
        }
        if fresh.is_some() {
            inner.stats.hits += 1;
            debug!(operation = key.operation(), fingerprint = key.fingerprint(), "cache hit");
        } else {
            inner.stats.misses += 1;
            debug!(operation = key.operation(), fingerprint = key.fingerprint(), "cache miss");
        }
        fresh
    }

    /// Store with the default TTL, replacing any existing entry.
    pub fn put(&self, operation: &str, args: &Value, value: ToolResult) {
        self.put_with_ttl(operation, args, value, self.default_ttl);
    }

    /// Store with an explicit TTL, replacing any existing entry. A zero TTL
    /// can never be fresh, so it drops the existing entry instead.
    pub fn put_with_ttl(&self, operation: &str, args: &Value, value: ToolResult, ttl: Duration) {
        let key = self.key_for(operation, args);
        self.put_key(key, value, ttl);
    }

    /// Store under a precomputed key.
    pub fn put_key(&self, key: CacheKey, value: ToolResult, ttl: Duration) {
        let mut inner = self.lock();
        if ttl.is_zero() {
            inner.entries.remove(&key);
            return;
        }
        let now = Instant::now();
        if let Some(max) = self.max_entries
            && !inner.entries.contains_key(&key)
            && inner.entries.len() >= max
        {
            Self::purge_locked(&mut inner, now);
            while inner.entries.len() >= max && Self::evict_oldest(&mut inner) {}
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        trace!(key = %key, ttl_secs = ttl.as_secs_f64(), "cache put");
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                ttl,
                seq,
            },
        );
    }

    /// Drop the entry for `(operation, args)`, if any.
    pub fn invalidate(&self, operation: &str, args: &Value) {
        let key = self.key_for(operation, args);
        self.lock().entries.remove(&key);
    }

    /// Drop every entry of one operation. Returns how many were removed.
    pub fn invalidate_operation(&self, operation: &str) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|k, _| k.operation() != operation);
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(operation, removed, "invalidated cached results");
        }
        removed
    }

    /// Drop everything.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Remove expired entries now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        Self::purge_locked(&mut self.lock(), now)
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Entries are plain values, so a panic elsewhere cannot leave the map
        // half-updated in a way that matters here.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn purge_locked(inner: &mut Inner, now: Instant) -> usize {
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.is_valid(now));
        let removed = before - inner.entries.len();
        inner.stats.expired += removed as u64;
        removed
    }

    /// Evict the oldest-inserted entry. Returns `false` when empty.
    fn evict_oldest(inner: &mut Inner) -> bool {
        let Some(oldest) = inner
            .entries
            .iter()
            .min_by_key(|(_, e)| e.seq)
            .map(|(k, _)| k.clone())
        else {
            return false;
        };
        inner.entries.remove(&oldest);
        inner.stats.evicted += 1;
        true
    }
}
