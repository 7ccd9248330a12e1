//! Query-level LRU cache wrapped around any retriever.
//!
//! The key includes every knob that changes the result, so tuning `k`
//! values never serves stale rankings.

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::errors::QuarryResult;
use crate::models::ScoredFragment;
use crate::retrieve::fusion::Retriever;

type CacheKey = (String, usize, usize, usize);

pub struct RetrievalCache {
    capacity: usize,
    entries: Mutex<IndexMap<CacheKey, Vec<ScoredFragment>>>,
}

impl RetrievalCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<ScoredFragment>> {
        let mut entries = self.entries.lock();
        // Move-to-end marks the entry as most recently used.
        let hits = entries.shift_remove(key)?;
        entries.insert(key.clone(), hits.clone());
        Some(hits)
    }

    pub fn put(&self, key: CacheKey, hits: Vec<ScoredFragment>) {
        let mut entries = self.entries.lock();
        entries.shift_remove(&key);
        if entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, hits);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// A retriever that consults the cache before its inner retriever.
pub struct CachedRetriever<R: Retriever> {
    inner: R,
    cache: RetrievalCache,
}

impl<R: Retriever> CachedRetriever<R> {
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            cache: RetrievalCache::new(capacity),
        }
    }

    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }
}

impl<R: Retriever> Retriever for CachedRetriever<R> {
    fn retrieve(
        &self,
        query: &str,
        k_lexical: usize,
        k_semantic: usize,
        k_final: usize,
    ) -> QuarryResult<Vec<ScoredFragment>> {
        let key = (query.to_string(), k_lexical, k_semantic, k_final);
        if let Some(hits) = self.cache.get(&key) {
            debug!(query = %query, "retrieval cache hit");
            return Ok(hits);
        }
        let hits = self.inner.retrieve(query, k_lexical, k_semantic, k_final)?;
        self.cache.put(key, hits.clone());
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::retrieve::fusion::testing::scored;

    struct CountingRetriever {
        calls: AtomicUsize,
    }

    impl Retriever for CountingRetriever {
        fn retrieve(
            &self,
            query: &str,
            _k_lexical: usize,
            _k_semantic: usize,
            _k_final: usize,
        ) -> QuarryResult<Vec<ScoredFragment>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![scored(query, query, 1.0)])
        }
    }

    #[test]
    fn test_repeat_query_served_from_cache() {
        let retriever = CachedRetriever::new(
            CountingRetriever {
                calls: AtomicUsize::new(0),
            },
            4,
        );
        let first = retriever.retrieve("alpha", 4, 4, 4).unwrap();
        let second = retriever.retrieve("alpha", 4, 4, 4).unwrap();
        assert_eq!(first, second);
        assert_eq!(retriever.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_key_includes_limits() {
        let retriever = CachedRetriever::new(
            CountingRetriever {
                calls: AtomicUsize::new(0),
            },
            4,
        );
        retriever.retrieve("alpha", 4, 4, 4).unwrap();
        retriever.retrieve("alpha", 4, 4, 2).unwrap();
        assert_eq!(retriever.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = RetrievalCache::new(2);
        let key = |q: &str| (q.to_string(), 1, 1, 1);
        cache.put(key("a"), vec![]);
        cache.put(key("b"), vec![]);
        // Touch a so b becomes the eviction candidate.
        cache.get(&key("a"));
        cache.put(key("c"), vec![]);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = RetrievalCache::new(2);
        cache.put(("a".to_string(), 1, 1, 1), vec![]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
