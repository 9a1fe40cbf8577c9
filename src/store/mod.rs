//! Store Contract and Tiered Composition
//!
//! A uniform key/value contract that heterogeneous backends implement, plus
//! the pieces every backend shares.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Chain (tiers 0..n)                       │
//! │   reads: near ──▶ far          writes: far ──▶ near              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  LruStore (tier 0)  │  MemoryStore  │  any other `Store` impl    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │   codec (expiry envelope)   │   range (ordered key window)       │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Not-found semantics
//!
//! `get` distinguishes three outcomes:
//!
//! - `Ok(Some(bytes))` - found, possibly an empty value
//! - `Ok(None)` - a negative answer; a chain stops at the tier giving it
//! - `Err(StoreError::NotFound)` - an explicit miss; a chain falls through
//!   to the next tier

use std::io::Read;
use std::ops::Deref;
use std::time::Duration;

use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};

use crate::error::Result;

mod chain;
pub mod codec;
mod lru;
mod memory;
pub mod range;
mod registry;

#[cfg(test)]
mod proptest;

pub use chain::Chain;
pub use codec::Envelope;
pub use lru::LruStore;
pub use memory::MemoryStore;
pub use range::select_range;
pub use registry::StoreRegistry;

/// Remaining TTL reported for entries that never expire
pub const TTL_INFINITE: Duration = Duration::MAX;

/// Upper bound on the buffer preallocated from a streamed write's size hint
const MAX_PREALLOC: usize = 1024 * 1024;

/// Visitor for ranged enumeration; return false to stop
pub type Visitor<'a> = dyn FnMut(&str, &[u8]) -> bool + 'a;

/// Streaming visitor for ranged enumeration; return false to stop
pub type ReaderVisitor<'a> = dyn FnMut(&str, &mut dyn Read) -> bool + 'a;

/// Key plus payload size, as reported by [`Store::range_keys`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key: String,
    pub size: i64,
}

impl KeyInfo {
    /// Size sentinel for adapters that cannot report a size cheaply
    pub const UNKNOWN_SIZE: i64 = -1;

    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }

    /// Create with an unknown size
    pub fn unknown_size(key: impl Into<String>) -> Self {
        Self::new(key, Self::UNKNOWN_SIZE)
    }

    pub fn has_known_size(&self) -> bool {
        self.size >= 0
    }
}

/// Ordered list of [`KeyInfo`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyInfoList(Vec<KeyInfo>);

impl KeyInfoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Just the keys, in list order
    pub fn keys(&self) -> Vec<String> {
        self.0.iter().map(|info| info.key.clone()).collect()
    }

    pub fn push(&mut self, info: KeyInfo) {
        self.0.push(info);
    }

    pub fn into_inner(self) -> Vec<KeyInfo> {
        self.0
    }
}

impl Deref for KeyInfoList {
    type Target = [KeyInfo];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<KeyInfo>> for KeyInfoList {
    fn from(infos: Vec<KeyInfo>) -> Self {
        Self(infos)
    }
}

impl FromIterator<KeyInfo> for KeyInfoList {
    fn from_iter<I: IntoIterator<Item = KeyInfo>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for KeyInfoList {
    type Item = KeyInfo;
    type IntoIter = std::vec::IntoIter<KeyInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Key/value storage contract shared by every backend and by [`Chain`].
///
/// All calls are synchronous and may block on the underlying medium.
pub trait Store: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str {
        "store"
    }

    /// Upsert a value that never expires
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.put_ttl(key, value, Duration::ZERO)
    }

    /// Upsert a value; a zero `ttl` never expires
    fn put_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    /// Read a live value. See the module docs for the not-found contract.
    fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Streamed upsert that never expires
    fn put_reader(&self, key: &str, reader: &mut dyn Read, size: i64) -> Result<()> {
        self.put_reader_ttl(key, reader, size, Duration::ZERO)
    }

    /// Streamed upsert. `size` is a hint and may be -1.
    fn put_reader_ttl(
        &self,
        key: &str,
        reader: &mut dyn Read,
        size: i64,
        ttl: Duration,
    ) -> Result<()> {
        let hint = usize::try_from(size).unwrap_or(0).min(MAX_PREALLOC);
        let mut buf = Vec::with_capacity(hint);
        reader.read_to_end(&mut buf)?;
        self.put_ttl(key, &buf, ttl)
    }

    /// Streamed read
    fn get_reader(&self, key: &str) -> Result<Option<Box<dyn Read + Send>>> {
        Ok(self
            .get(key)?
            .map(|value| Box::new(value.reader()) as Box<dyn Read + Send>))
    }

    /// True iff a live entry exists
    fn exist(&self, key: &str) -> Result<bool>;

    /// Remove an entry; deleting an absent key is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// Remaining time to live, [`TTL_INFINITE`] for entries without expiry
    fn ttl(&self, key: &str) -> Result<Duration>;

    /// Live keys in the `[prefix, limit)` window, ascending, at most `max`
    /// entries. `max == 0` yields no entries.
    fn range_keys(&self, prefix: &str, limit: &str, max: usize) -> Result<KeyInfoList>;

    /// Unbounded variant of [`Store::range_keys`]
    fn all_keys(&self, prefix: &str, limit: &str) -> Result<KeyInfoList> {
        self.range_keys(prefix, limit, usize::MAX)
    }

    /// Visit live entries in the `[prefix, limit)` window in ascending key
    /// order until `visit` returns false
    fn range(&self, prefix: &str, limit: &str, visit: &mut Visitor<'_>) -> Result<()>;

    /// Streaming variant of [`Store::range`]
    fn range_reader(&self, prefix: &str, limit: &str, visit: &mut ReaderVisitor<'_>) -> Result<()> {
        self.range(prefix, limit, &mut |key, value| {
            let mut reader: &[u8] = value;
            visit(key, &mut reader)
        })
    }

    /// Release backend resources
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
