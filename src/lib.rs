//! kvchain - Tiered Key/Value Store Chains
//!
//! A uniform key/value contract over heterogeneous backends, composed into
//! multi-tier chains.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ Chain ──▶ [tier 0 (near)] ... [tier n-1 (far)]
//!                          │                     │
//!                          └── expiry envelope ──┘
//! ```
//!
//! - Writes go far → near, so a near cache never holds data a durable tier
//!   rejected
//! - Reads go near → far and take the first tier that answers
//! - Values carry a 4-byte expiry header so any backend supports TTLs
//! - Backends without ordered iteration share one key-window selector
//!
//! # Modules
//!
//! - [`cache`] - Generic thread-safe LRU cache
//! - [`config`] - YAML configuration of stores and chains
//! - [`error`] - Error types
//! - [`store`] - Store contract, chain, codec, range selector and backends

pub mod cache;
pub mod config;
pub mod error;
pub mod store;

// Re-export commonly used types
pub use cache::{LruCache, LruStats};
pub use config::KvConfig;
pub use error::{Result, StoreError};
pub use store::{
    Chain, KeyInfo, KeyInfoList, LruStore, MemoryStore, Store, StoreRegistry, TTL_INFINITE,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
