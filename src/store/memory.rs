//! In-process map backend
//!
//! Uses DashMap for sharded concurrent access. Values are stored as expiry
//! envelopes; expired entries read as absent and are purged lazily.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::trace;

use super::codec::{self, Envelope};
use super::range::select_range;
use super::{KeyInfo, KeyInfoList, Store, Visitor};
use crate::error::Result;

/// In-memory store. A missing key reads as `Ok(None)`.
pub struct MemoryStore {
    name: String,
    entries: DashMap<String, Bytes>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::named("memory")
    }
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-memory store with a name used in logs
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    /// Number of stored envelopes, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn live(&self, key: &str) -> Option<Envelope> {
        let raw = self.entries.get(key).map(|entry| entry.value().clone())?;
        match codec::decode(&raw) {
            Some(envelope) if envelope.is_valid() => Some(envelope),
            _ => {
                self.purge(key);
                None
            }
        }
    }

    /// Drop `key` if it is still expired or corrupt. A fresh write that
    /// raced in since the read is left alone.
    fn purge(&self, key: &str) {
        let removed = self.entries.remove_if(key, |_, raw| {
            !codec::decode(raw).is_some_and(|envelope| envelope.is_valid())
        });
        if removed.is_some() {
            trace!(store = %self.name, key, "purged expired entry");
        }
    }

    /// Payloads of every live entry; expired entries are purged afterwards
    fn snapshot(&self) -> HashMap<String, Bytes> {
        let now = codec::now_secs();
        let mut live = HashMap::new();
        let mut expired = Vec::new();

        for entry in self.entries.iter() {
            match codec::decode_at(entry.value(), now) {
                Some(envelope) if envelope.is_valid() => {
                    live.insert(entry.key().clone(), envelope.into_payload());
                }
                _ => expired.push(entry.key().clone()),
            }
        }

        for key in expired {
            self.purge(&key);
        }
        live
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn put_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), codec::encode(ttl, value));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        Ok(self.live(key).map(Envelope::into_payload))
    }

    fn exist(&self, key: &str) -> Result<bool> {
        Ok(self.live(key).is_some())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn ttl(&self, key: &str) -> Result<Duration> {
        Ok(self
            .live(key)
            .map_or(Duration::ZERO, |envelope| envelope.remaining()))
    }

    fn range_keys(&self, prefix: &str, limit: &str, max: usize) -> Result<KeyInfoList> {
        let live = self.snapshot();
        let keys = select_range(live.keys().cloned().collect::<Vec<_>>(), prefix, limit);

        Ok(keys
            .into_iter()
            .take(max)
            .map(|key| {
                let size = live.get(&key).map_or(0, |value| value.len() as i64);
                KeyInfo::new(key, size)
            })
            .collect())
    }

    fn range(&self, prefix: &str, limit: &str, visit: &mut Visitor<'_>) -> Result<()> {
        let live = self.snapshot();
        let keys = select_range(
            live.keys().map(String::as_str).collect::<Vec<_>>(),
            prefix,
            limit,
        );

        for key in keys {
            if !visit(key, &live[key]) {
                break;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
