//! Recency Cache
//!
//! Generic, thread-safe, capacity-bounded LRU cache used as an in-process
//! tier of a store chain.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         LruCache<K, V>                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  HashMap<K, slot>  ──▶  slab of nodes (prev/next indices)     │
//! │                                                              │
//! │  head (most recent) ◀──▶ ... ◀──▶ tail (next eviction)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design
//!
//! - O(1) add/get/remove/evict through index-linked nodes
//! - Structural operations (including `get`, which promotes) take the
//!   exclusive lock; `peek`/`contains` take the shared lock
//! - Eviction callbacks run after the lock is released, in eviction order

mod lru;

pub use lru::{EvictCallback, LruCache, LruStats};

/// Capacity used when a cache is constructed with capacity 0
pub const DEFAULT_CAPACITY: usize = 16;
