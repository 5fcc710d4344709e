//! Bounded FIFO cache of recent text translations.
//! Key: blake3 hash of (target_lang | normalized_text). Capacity: 50.
//!
//! Backed by `LruCache` but only ever touched through `peek`/`peek_mut`/`push`,
//! so recency never changes and eviction order is insertion order. A repeated
//! key is updated in place and keeps its slot.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

pub type CacheKey = [u8; 32];

pub struct TranslationCache {
    inner: Mutex<LruCache<CacheKey, String>>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn compute_key(target_lang: &str, normalized_text: &str) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(target_lang.to_ascii_uppercase().as_bytes());
        hasher.update(b"|");
        hasher.update(normalized_text.as_bytes());
        *hasher.finalize().as_bytes()
    }

    pub fn get(&self, key: &CacheKey) -> Option<String> {
        self.inner.lock().peek(key).cloned()
    }

    /// Insert or update in place; evicts the oldest entry when full.
    pub fn insert(&self, key: CacheKey, translated_text: String) {
        let mut cache = self.inner.lock();
        if let Some(existing) = cache.peek_mut(&key) {
            *existing = translated_text;
            return;
        }
        cache.push(key, translated_text);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
