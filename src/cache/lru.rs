//! LRU Cache - capacity-bounded recency cache
//!
//! # Design
//!
//! - Nodes live in a slab (`Vec<Option<Node>>`) and link to each other by
//!   index, so promotion and eviction never allocate
//! - A free list recycles slots of removed nodes
//! - `parking_lot::RwLock` guards the structure; hit/miss/eviction counters
//!   are atomics outside the lock

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::DEFAULT_CAPACITY;

/// Callback fired with `(key, value)` whenever an entry leaves the cache
/// through capacity pressure, explicit removal or clear.
///
/// Runs on the thread that triggered the eviction, after the cache lock
/// has been released.
pub type EvictCallback<K, V> = Box<dyn Fn(&K, &V) + Send + Sync>;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    capacity: usize,
    index: HashMap<K, usize>,
    slots: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.slots[idx].as_ref().expect("linked slot is occupied")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.slots[idx].as_mut().expect("linked slot is occupied")
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let node = self.node_mut(idx);
        node.prev = None;
        node.next = None;
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => self.node_mut(h).prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    fn push_front(&mut self, key: K, value: V) {
        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };
        self.index.insert(key, idx);
        self.link_front(idx);
    }

    fn remove_at(&mut self, idx: usize) -> (K, V) {
        self.unlink(idx);
        let node = self.slots[idx].take().expect("linked slot is occupied");
        self.free.push(idx);
        self.index.remove(&node.key);
        (node.key, node.value)
    }

    fn pop_back(&mut self) -> Option<(K, V)> {
        let tail = self.tail?;
        Some(self.remove_at(tail))
    }
}

/// Thread-safe LRU cache
pub struct LruCache<K, V> {
    inner: RwLock<Inner<K, V>>,
    on_evict: Option<EvictCallback<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    /// Create a cache without an eviction callback.
    ///
    /// A capacity of 0 falls back to [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Create a cache that reports every evicted entry to `on_evict`
    pub fn with_evict<F>(capacity: usize, on_evict: F) -> Self
    where
        F: Fn(&K, &V) + Send + Sync + 'static,
    {
        Self::build(capacity, Some(Box::new(on_evict)))
    }

    fn build(capacity: usize, on_evict: Option<EvictCallback<K, V>>) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        Self {
            inner: RwLock::new(Inner::new(capacity)),
            on_evict,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Insert or update an entry, making it the most recently used.
    ///
    /// Returns true if inserting pushed the oldest entry out.
    pub fn add(&self, key: K, value: V) -> bool {
        let evicted = {
            let mut inner = self.inner.write();
            if let Some(idx) = inner.index.get(&key).copied() {
                inner.move_to_front(idx);
                inner.node_mut(idx).value = value;
                return false;
            }
            inner.push_front(key, value);
            if inner.len() > inner.capacity {
                inner.pop_back()
            } else {
                None
            }
        };

        match evicted {
            Some((k, v)) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.notify(&k, &v);
                true
            }
            None => false,
        }
    }

    /// Look up an entry and promote it to most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut inner = self.inner.write();
        match inner.index.get(key).copied() {
            Some(idx) => {
                inner.move_to_front(idx);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(inner.node(idx).value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up an entry without touching the recency order
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let inner = self.inner.read();
        inner
            .index
            .get(key)
            .map(|&idx| inner.node(idx).value.clone())
    }

    /// Check if a key is cached, without touching the recency order
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.read().index.contains_key(key)
    }

    /// Remove an entry, firing the eviction callback if it was present
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_if(key, |_| true)
    }

    /// Remove an entry only if `pred` holds for its current value.
    ///
    /// The check and the removal happen under one exclusive lock.
    pub fn remove_if<Q, F>(&self, key: &Q, pred: F) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let (k, v) = {
            let mut inner = self.inner.write();
            let idx = match inner.index.get(key).copied() {
                Some(idx) => idx,
                None => return false,
            };
            if !pred(&inner.node(idx).value) {
                return false;
            }
            inner.remove_at(idx)
        };

        self.notify(&k, &v);
        true
    }

    /// Remove and return the least recently used entry
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        let removed = self.inner.write().pop_back();
        if let Some((k, v)) = &removed {
            self.notify(k, v);
        }
        removed
    }

    /// Return the least recently used entry without removing it
    pub fn get_oldest(&self) -> Option<(K, V)> {
        let inner = self.inner.read();
        inner.tail.map(|idx| {
            let node = inner.node(idx);
            (node.key.clone(), node.value.clone())
        })
    }

    /// All keys, oldest first
    pub fn keys(&self) -> Vec<K> {
        let inner = self.inner.read();
        let mut keys = Vec::with_capacity(inner.len());
        let mut cursor = inner.tail;
        while let Some(idx) = cursor {
            let node = inner.node(idx);
            keys.push(node.key.clone());
            cursor = node.prev;
        }
        keys
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    ///
    /// Returns the number of evicted entries.
    pub fn resize(&self, capacity: usize) -> usize {
        let evicted = {
            let mut inner = self.inner.write();
            let mut evicted = Vec::new();
            while inner.len() > capacity {
                match inner.pop_back() {
                    Some(kv) => evicted.push(kv),
                    None => break,
                }
            }
            inner.capacity = capacity;
            evicted
        };

        self.evictions
            .fetch_add(evicted.len() as u64, Ordering::Relaxed);
        for (k, v) in &evicted {
            self.notify(k, v);
        }
        evicted.len()
    }

    /// Evict every entry, oldest first
    pub fn clear(&self) {
        let drained = {
            let mut inner = self.inner.write();
            let mut drained = Vec::with_capacity(inner.len());
            while let Some(kv) = inner.pop_back() {
                drained.push(kv);
            }
            inner.slots.clear();
            inner.free.clear();
            drained
        };

        for (k, v) in &drained {
            self.notify(k, v);
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity
    pub fn capacity(&self) -> usize {
        self.inner.read().capacity
    }

    /// Get hit count
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Get miss count
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Get capacity eviction count (explicit removals are not counted)
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Get hit ratio
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> LruStats {
        let (len, capacity) = {
            let inner = self.inner.read();
            (inner.len(), inner.capacity)
        };
        LruStats {
            len,
            capacity,
            hits: self.hits(),
            misses: self.misses(),
            evictions: self.evictions(),
            hit_ratio: self.hit_ratio(),
        }
    }

    fn notify(&self, key: &K, value: &V) {
        if let Some(cb) = &self.on_evict {
            cb(key, value);
        }
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("LruCache")
            .field("len", &inner.index.len())
            .field("capacity", &inner.capacity)
            .field("has_evict_callback", &self.on_evict.is_some())
            .finish()
    }
}

/// LRU cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct LruStats {
    /// Number of entries
    pub len: usize,
    /// Capacity in entries
    pub capacity: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Capacity eviction count
    pub evictions: u64,
    /// Hit ratio (0.0 - 1.0)
    pub hit_ratio: f64,
}

// =============================================================================
// Tests
// =============================================================================
