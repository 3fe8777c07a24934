//! Content-addressed, single-flight result cache.
//!
//! Each key maps to a shared `OnceCell`; the first requester runs the
//! computation while concurrent requesters for the same key await it. If the
//! running computation is dropped the next waiter takes over.

use crate::analysis::Window;
use crate::utils::content_hash;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Identity of one analysis: target content, its position and search bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub content_hash: String,
    pub window: Window,
    pub target: usize,
}

impl CacheKey {
    pub fn new(content: &str, window: Window, target: usize) -> Self {
        Self { content_hash: content_hash(content), window, target }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct SingleFlightCache<K, V> {
    entries: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for SingleFlightCache<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlightCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing it at most once.
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = {
            let mut entries = self.entries.lock();
            entries.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };

        if let Some(value) = cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value.clone();
        }

        let mut ran = false;
        let value = cell
            .get_or_init(|| {
                ran = true;
                compute()
            })
            .await;
        let counter = if ran { &self.misses } else { &self.hits };
        counter.fetch_add(1, Ordering::Relaxed);
        value.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().values().filter(|cell| cell.initialized()).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drop the finished entry for `key` if `stale` accepts its value, so
    /// the next request computes afresh. In-flight entries are left alone.
    pub fn evict_if(&self, key: &K, stale: impl FnOnce(&V) -> bool) -> bool {
        let mut entries = self.entries.lock();
        let evict = entries.get(key).and_then(|cell| cell.get()).is_some_and(stale);
        if evict {
            entries.remove(key);
        }
        evict
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
