//! Bounded per-repository cache of parsed blobs.
//!
//! A blob touched by many commits is parsed once while it stays in the cache.
//! Each repository owns its own cache; nothing is shared across repositories.

use std::num::NonZeroUsize;
use std::sync::Arc;

use git2::Oid;
use lru::LruCache;
use parking_lot::Mutex;

use crate::lang::common::SyntaxNode;

/// Contents and syntax tree of one blob.
#[derive(Debug)]
pub struct ParsedBlob {
    /// Decoded file contents
    pub content: String,
    /// Parsed tree
    pub tree: SyntaxNode,
}

/// Hit/miss counters of a [`BlobCache`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that had to parse
    pub misses: u64,
}

/// Thread-safe LRU cache keyed by blob id.
#[derive(Debug)]
pub struct BlobCache {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<Oid, Arc<ParsedBlob>>,
    stats: CacheStats,
}

impl BlobCache {
    /// Cache holding at most `capacity` blobs (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Cached blob, refreshing its recency
    pub fn get(&self, oid: &Oid) -> Option<Arc<ParsedBlob>> {
        let mut inner = self.inner.lock();
        let found = inner.entries.get(oid).cloned();
        match found {
            Some(_) => inner.stats.hits += 1,
            None => inner.stats.misses += 1,
        }
        found
    }

    /// Insert a parsed blob, evicting the least recently used one when full
    pub fn insert(&self, oid: Oid, blob: Arc<ParsedBlob>) {
        self.inner.lock().entries.put(oid, blob);
    }

    /// Cached blob or the result of `parse`; failures are not cached.
    pub fn get_or_parse<E, F>(&self, oid: Oid, parse: F) -> std::result::Result<Arc<ParsedBlob>, E>
    where
        F: FnOnce() -> std::result::Result<ParsedBlob, E>,
    {
        if let Some(blob) = self.get(&oid) {
            return Ok(blob);
        }
        // Parse outside the lock; a concurrent miss may parse the same blob twice.
        let blob = Arc::new(parse()?);
        self.insert(oid, Arc::clone(&blob));
        Ok(blob)
    }

    /// Number of cached blobs
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counters so far
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}
