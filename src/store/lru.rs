//! Capacity-bounded in-process backend over [`LruCache`]
//!
//! A miss reports [`StoreError::NotFound`], so an `LruStore` in front of a
//! chain lets reads fall through to farther tiers.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use super::codec::{self, Envelope};
use super::range::select_range;
use super::{KeyInfo, KeyInfoList, Store, Visitor};
use crate::cache::{LruCache, LruStats};
use crate::error::{Result, StoreError};

/// LRU-bounded store of expiry envelopes
pub struct LruStore {
    name: String,
    cache: LruCache<String, Bytes>,
}

impl LruStore {
    /// Create a store holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            name: "lru".to_string(),
            cache: LruCache::new(capacity),
        }
    }

    /// Create a store that reports live entries leaving the cache.
    ///
    /// Expired entries are dropped without notification.
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Self
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        let cache = LruCache::with_evict(capacity, move |key: &String, raw: &Bytes| {
            if let Some(envelope) = codec::decode(raw) {
                if envelope.is_valid() {
                    on_evict(key, envelope.payload());
                }
            }
        });
        Self {
            name: "lru".to_string(),
            cache,
        }
    }

    /// Set the name used in logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Change capacity, returning how many entries were evicted
    pub fn resize(&self, capacity: usize) -> usize {
        self.cache.resize(capacity)
    }

    /// Hit/miss/eviction counters of the underlying cache
    pub fn stats(&self) -> LruStats {
        self.cache.stats()
    }

    /// Live envelope for `key` without touching recency order
    fn peek_live(&self, key: &str) -> Option<Envelope> {
        let raw = self.cache.peek(key)?;
        match codec::decode(&raw) {
            Some(envelope) if envelope.is_valid() => Some(envelope),
            _ => {
                self.purge(key);
                None
            }
        }
    }

    fn purge(&self, key: &str) {
        let removed = self.cache.remove_if(key, |raw| {
            !codec::decode(raw).is_some_and(|envelope| envelope.is_valid())
        });
        if removed {
            trace!(store = %self.name, key, "purged expired entry");
        }
    }

    /// Live entries in the `[prefix, limit)` window, ascending. Expired
    /// entries are purged before the window bounds are chosen.
    fn window(&self, prefix: &str, limit: &str) -> Vec<(String, Bytes)> {
        let mut live: HashMap<String, Bytes> = self
            .cache
            .keys()
            .into_iter()
            .filter_map(|key| {
                let envelope = self.peek_live(&key)?;
                Some((key, envelope.into_payload()))
            })
            .collect();

        select_range(live.keys().cloned().collect::<Vec<_>>(), prefix, limit)
            .into_iter()
            .filter_map(|key| live.remove(&key).map(|payload| (key, payload)))
            .collect()
    }
}

impl Store for LruStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn put_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.cache.add(key.to_string(), codec::encode(ttl, value));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let raw = self.cache.get(key).ok_or(StoreError::NotFound)?;
        match codec::decode(&raw) {
            Some(envelope) if envelope.is_valid() => Ok(Some(envelope.into_payload())),
            _ => {
                self.purge(key);
                Err(StoreError::NotFound)
            }
        }
    }

    fn exist(&self, key: &str) -> Result<bool> {
        Ok(self.peek_live(key).is_some())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.cache.remove(key);
        Ok(())
    }

    fn ttl(&self, key: &str) -> Result<Duration> {
        self.peek_live(key)
            .map(|envelope| envelope.remaining())
            .ok_or(StoreError::NotFound)
    }

    fn range_keys(&self, prefix: &str, limit: &str, max: usize) -> Result<KeyInfoList> {
        Ok(self
            .window(prefix, limit)
            .into_iter()
            .take(max)
            .map(|(key, payload)| KeyInfo::new(key, payload.len() as i64))
            .collect())
    }

    fn range(&self, prefix: &str, limit: &str, visit: &mut Visitor<'_>) -> Result<()> {
        for (key, payload) in self.window(prefix, limit) {
            if !visit(&key, &payload) {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        trace!(store = %self.name, entries = self.cache.len(), "closing lru store");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
