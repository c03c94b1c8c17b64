//! Bounded thumbnail cache with insertion-order eviction.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use pagecraft_render::Bitmap;
use serde::{Deserialize, Serialize};

/// Number of thumbnails kept when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Cache key: a document and one of its pages.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    pub document_id: String,
    pub page: u32,
}

impl ThumbnailKey {
    pub fn new(document_id: impl Into<String>, page: u32) -> Self {
        Self {
            document_id: document_id.into(),
            page,
        }
    }
}

impl fmt::Display for ThumbnailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-page-{}", self.document_id, self.page)
    }
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}

/// Thumbnail cache.
///
/// Lookups only peek, so the recency order is the insertion order and the
/// entry inserted first is evicted when full.
pub struct ThumbnailCache {
    cache: LruCache<ThumbnailKey, Arc<Bitmap>>,
}

impl ThumbnailCache {
    /// Create a cache holding at most `capacity` thumbnails (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// Get a cached thumbnail without refreshing it.
    #[must_use]
    pub fn get(&self, key: &ThumbnailKey) -> Option<Arc<Bitmap>> {
        self.cache.peek(key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: &ThumbnailKey) -> bool {
        self.cache.contains(key)
    }

    /// Insert a thumbnail, returning the shared handle stored in the cache.
    ///
    /// Replacing an existing key keeps its original eviction position.
    pub fn insert(&mut self, key: ThumbnailKey, bitmap: Bitmap) -> Arc<Bitmap> {
        let bitmap = Arc::new(bitmap);
        match self.cache.peek_mut(&key) {
            Some(slot) => *slot = Arc::clone(&bitmap),
            None => {
                self.cache.push(key, Arc::clone(&bitmap));
            }
        }
        bitmap
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity(),
        }
    }
}

impl fmt::Debug for ThumbnailCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
