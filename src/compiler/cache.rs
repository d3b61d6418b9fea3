//! Process-wide cache of compiled expressions, keyed by source text.
//!
//! Mirrors the teacher's `GlobalBytecodeCache`: a weak-reference main table
//! plus a small strong-reference "recent" tier so hot expressions survive
//! even under memory pressure, with `CacheStats` tracked via atomics.

use crate::compiler::bound::BoundNode;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

/// A compiled expression plus the metadata needed to manage its cache entry.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    /// The bound tree.
    pub root: Arc<BoundNode>,
    /// Whether any reachable call resolves to an async (terminology)
    /// function; drives the sync-fast-path vs async-fallback choice.
    pub uses_async: bool,
    /// Seconds-since-epoch this entry was compiled.
    compiled_at: u64,
}

impl CompiledExpression {
    fn new(root: BoundNode, uses_async: bool) -> Self {
        Self {
            root: Arc::new(root),
            uses_async,
            compiled_at: now_secs(),
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Cache hit/miss/eviction counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Total cache hits.
    pub hits: AtomicU64,
    /// Total cache misses.
    pub misses: AtomicU64,
    /// Entries evicted from the recent tier.
    pub evictions: AtomicU64,
    /// Current count of entries in the recent (strong) tier.
    pub recent_len: AtomicUsize,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`, `0.0` if no lookups have occurred.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// The process-wide compiled-expression cache.
pub struct CompiledExpressionCache {
    weak: DashMap<String, Weak<CompiledExpression>>,
    recent: DashMap<String, Arc<CompiledExpression>>,
    recent_limit: usize,
    stats: CacheStats,
}

impl CompiledExpressionCache {
    /// A cache with the default recent-tier size.
    pub fn new() -> Self {
        Self::with_recent_limit(256)
    }

    /// A cache keeping at most `recent_limit` strong references.
    pub fn with_recent_limit(recent_limit: usize) -> Self {
        Self {
            weak: DashMap::new(),
            recent: DashMap::new(),
            recent_limit,
            stats: CacheStats::default(),
        }
    }

    /// Look up a previously compiled expression by its exact source text.
    pub fn get(&self, source: &str) -> Option<Arc<CompiledExpression>> {
        if let Some(entry) = self.recent.get(source) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.clone());
        }
        if let Some(weak) = self.weak.get(source) {
            if let Some(strong) = weak.upgrade() {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                self.promote(source.to_string(), strong.clone());
                return Some(strong);
            }
        }
        self.weak.remove(source);
        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a freshly compiled expression under `source`.
    pub fn insert(&self, source: String, root: BoundNode, uses_async: bool) -> Arc<CompiledExpression> {
        let compiled = Arc::new(CompiledExpression::new(root, uses_async));
        self.weak.insert(source.clone(), Arc::downgrade(&compiled));
        self.promote(source, compiled.clone());
        compiled
    }

    fn promote(&self, source: String, entry: Arc<CompiledExpression>) {
        if self.recent.len() >= self.recent_limit && !self.recent.contains_key(&source) {
            self.evict_oldest();
        }
        self.recent.insert(source, entry);
        self.stats.recent_len.store(self.recent.len(), Ordering::Relaxed);
    }

    fn evict_oldest(&self) {
        let oldest = self
            .recent
            .iter()
            .min_by_key(|e| e.value().compiled_at)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.recent.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop dead weak entries and clear the recent tier.
    pub fn clear(&self) {
        self.weak.clear();
        self.recent.clear();
        self.stats.recent_len.store(0, Ordering::Relaxed);
    }

    /// Cache statistics for diagnostics/monitoring.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for CompiledExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

static CACHE_EPOCH: AtomicU32 = AtomicU32::new(1);
static GLOBAL_CACHE: once_cell::sync::Lazy<CompiledExpressionCache> =
    once_cell::sync::Lazy::new(CompiledExpressionCache::new);

/// The process-wide compiled-expression cache instance.
pub fn global_cache() -> &'static CompiledExpressionCache {
    &GLOBAL_CACHE
}

/// Bump the cache epoch and clear the global cache (e.g. after a
/// `userInvocationTable` change invalidates previously bound calls).
pub fn invalidate_global_cache() {
    CACHE_EPOCH.fetch_add(1, Ordering::Relaxed);
    GLOBAL_CACHE.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::bound::{BoundKind, BoundNode};

    fn dummy_node() -> BoundNode {
        BoundNode {
            kind: BoundKind::Literal(crate::model::FhirPathValue::Integer(1)),
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = CompiledExpressionCache::new();
        assert!(cache.get("Patient.name").is_none());
        cache.insert("Patient.name".to_string(), dummy_node(), false);
        assert!(cache.get("Patient.name").is_some());
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn recent_tier_evicts_oldest_past_limit() {
        let cache = CompiledExpressionCache::with_recent_limit(2);
        for i in 0..5 {
            cache.insert(format!("expr{i}"), dummy_node(), false);
        }
        assert!(cache.recent.len() <= 2);
        assert!(cache.stats().evictions.load(Ordering::Relaxed) > 0);
    }
}
