//! Half-map cache and call memoization
//!
//! The half-map cache files query results under their `(source, code)` key.
//! Entries hold every half-map for the key, or nothing at all when the code
//! is unknown to the source, so a cached key never needs the store again.
//!
//! Thread-safe via interior mutability: `DashMap` for the unbounded cache
//! and the memo tables, `parking_lot::Mutex` around the LRU.

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::halfmap::{CacheKey, HalfMap};

/// Separator between signature parts (ASCII unit separator)
const SIGNATURE_SEPARATOR: char = '\u{1f}';

/// Cache metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
}

impl CacheMetrics {
    /// Get hit rate as a fraction (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Record a cache hit
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a cache miss
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }
}

/// Storage for half-maps keyed by `(source, code)`.
///
/// Implementations must tolerate concurrent `get`/`put`; two writers racing
/// on one key carry identical data, so last-writer-wins is fine.
pub trait HalfMapCache: Send + Sync {
    /// Half-maps filed under `key`, if the key has been cached
    fn get(&self, key: &CacheKey) -> Option<Vec<HalfMap>>;

    /// File `halfmaps` under `key`, replacing any previous entry
    fn put(&self, key: CacheKey, halfmaps: Vec<HalfMap>);

    /// Number of cached keys
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hit/miss counts
    fn metrics(&self) -> CacheMetrics;
}

/// Cache without eviction; grows for the lifetime of the mapper.
#[derive(Debug, Default)]
pub struct UnboundedCache {
    entries: DashMap<CacheKey, Vec<HalfMap>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl UnboundedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HalfMapCache for UnboundedCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<HalfMap>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn put(&self, key: CacheKey, halfmaps: Vec<HalfMap>) {
        self.entries.insert(key, halfmaps);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Inner state for BoundedCache (protected by Mutex)
struct BoundedState {
    entries: LruCache<CacheKey, Vec<HalfMap>>,
    metrics: CacheMetrics,
}

/// Cache holding at most `capacity` keys, evicting the least recently used.
///
/// Every `get` updates recency, so the mutex is taken on reads as well.
pub struct BoundedCache {
    state: Mutex<BoundedState>,
}

impl BoundedCache {
    /// Create a cache for `capacity` keys (a capacity of 0 is treated as 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(BoundedState {
                entries: LruCache::new(capacity),
                metrics: CacheMetrics::default(),
            }),
        }
    }

    /// Maximum number of keys held
    pub fn capacity(&self) -> usize {
        self.state.lock().entries.cap().get()
    }
}

impl HalfMapCache for BoundedCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<HalfMap>> {
        let mut state = self.state.lock();
        match state.entries.get(key).cloned() {
            Some(halfmaps) => {
                state.metrics.record_hit();
                Some(halfmaps)
            }
            None => {
                state.metrics.record_miss();
                None
            }
        }
    }

    fn put(&self, key: CacheKey, halfmaps: Vec<HalfMap>) {
        self.state.lock().entries.put(key, halfmaps);
    }

    fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    fn metrics(&self) -> CacheMetrics {
        self.state.lock().metrics.clone()
    }
}

/// Results of a pure lookup, keyed by a signature of its arguments.
///
/// The computation runs outside the table's shards, so two callers racing on
/// a cold signature may both compute it; the results are equal and the
/// second insert is harmless.
#[derive(Debug)]
pub struct Memo<V> {
    entries: DashMap<String, V>,
    hits: AtomicU64,
}

impl<V> Default for Memo<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
        }
    }
}

impl<V: Clone> Memo<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the memoized value for `signature`, computing it on first use
    pub fn get_or_try_insert_with<E>(
        &self,
        signature: String,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.entries.get(&signature) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value.value().clone());
        }

        let value = compute()?;
        self.entries.insert(signature, value.clone());
        Ok(value)
    }

    /// Number of memoized signatures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calls answered without computing
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

/// Signature of a call: operation name, then the sorted, de-duplicated
/// arguments
pub fn signature<S: AsRef<str>>(operation: &str, args: &[S]) -> String {
    let mut args: Vec<&str> = args.iter().map(|c| c.as_ref()).collect();
    args.sort_unstable();
    args.dedup();

    let mut signature = String::from(operation);
    for arg in args {
        signature.push(SIGNATURE_SEPARATOR);
        signature.push_str(arg);
    }
    signature
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn hm(code: &str) -> HalfMap {
        HalfMap::new("C1", "A1", "SRC", code, "label")
    }

    #[test]
    fn test_unbounded_get_put() {
        let cache = UnboundedCache::new();
        let key = CacheKey::new("SRC", "X1");

        assert_eq!(cache.get(&key), None);
        cache.put(key.clone(), vec![hm("X1")]);
        assert_eq!(cache.get(&key), Some(vec![hm("X1")]));
        assert_eq!(cache.len(), 1);

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert!((metrics.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_entry_is_a_hit() {
        let cache = UnboundedCache::new();
        let key = CacheKey::new("SRC", "UNKNOWN");
        cache.put(key.clone(), Vec::new());

        assert_eq!(cache.get(&key), Some(Vec::new()));
        assert_eq!(cache.metrics().hits, 1);
    }

    #[test]
    fn test_bounded_evicts_least_recently_used() {
        let cache = BoundedCache::new(2);
        let a = CacheKey::new("SRC", "A");
        let b = CacheKey::new("SRC", "B");
        let c = CacheKey::new("SRC", "C");

        cache.put(a.clone(), vec![hm("A")]);
        cache.put(b.clone(), vec![hm("B")]);
        // Touch A so B becomes the eviction candidate
        assert!(cache.get(&a).is_some());
        cache.put(c.clone(), vec![hm("C")]);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&a).is_some());
        assert!(cache.get(&b).is_none());
        assert!(cache.get(&c).is_some());
    }

    #[test]
    fn test_bounded_zero_capacity() {
        let cache = BoundedCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }

    #[test]
    fn test_concurrent_puts_and_gets() {
        let cache = UnboundedCache::new();

        thread::scope(|s| {
            for t in 0..8 {
                let cache = &cache;
                s.spawn(move || {
                    for i in 0..100 {
                        let code = format!("X{}", i);
                        let key = CacheKey::new("SRC", &code);
                        cache.put(key.clone(), vec![hm(&code)]);
                        assert_eq!(cache.get(&key), Some(vec![hm(&code)]), "thread {}", t);
                    }
                });
            }
        });

        assert_eq!(cache.len(), 100);
    }

    #[test]
    fn test_memo_computes_once() {
        let memo: Memo<Vec<String>> = Memo::new();
        let mut calls = 0;

        for _ in 0..3 {
            let value = memo
                .get_or_try_insert_with::<()>(signature("op", &["b", "a"]), || {
                    calls += 1;
                    Ok(vec!["x".to_string()])
                })
                .unwrap();
            assert_eq!(value, vec!["x".to_string()]);
        }

        assert_eq!(calls, 1);
        assert_eq!(memo.hits(), 2);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_memo_does_not_store_errors() {
        let memo: Memo<u32> = Memo::new();

        let err = memo.get_or_try_insert_with(signature("op", &["a"]), || Err("boom"));
        assert_eq!(err, Err("boom"));
        assert!(memo.is_empty());
    }

    #[test]
    fn test_signature_normalizes_arguments() {
        assert_eq!(signature("op", &["b", "a", "b"]), signature("op", &["a", "b"]));
        assert_ne!(signature("op", &["a"]), signature("other", &["a"]));
        assert_ne!(signature("op", &["ab"]), signature("op", &["a", "b"]));
        assert_eq!(signature::<&str>("op", &[]), "op");
    }
}
