//! Chain - tiered composition of stores
//!
//! Tier 0 is the nearest (fastest) store, tier n-1 the farthest (most
//! durable).
//!
//! # Fan-out policies
//!
//! | Operation | Direction | Stops at |
//! |---|---|---|
//! | `get`, `ttl`, `range_keys`, `get_reader` | near → far | first `Ok` |
//! | `exist` | near → far | first `Ok(true)` |
//! | `range`, `range_reader` | near → far, merged ascending | first error, or visitor `false` |
//! | `put*` | far → near | first error |
//! | `delete` | near → far | first error |
//! | `close` | near → far | never |
//!
//! Ranges collect every tier's window before visiting, so the visitor sees
//! one ascending walk in which a nearer tier's value wins for a shared key.
//!
//! Errors are returned exactly as the tier produced them. There is no
//! rollback: a write that lands on a far tier and then fails on a nearer one
//! leaves the tiers out of step.

use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::{KeyInfoList, Store, Visitor};
use crate::error::Result;

/// Ordered, immutable sequence of tiers acting as one store
#[derive(Clone, Default)]
pub struct Chain {
    tiers: Vec<Arc<dyn Store>>,
}

impl Chain {
    /// Create a chain; `tiers[0]` is the nearest tier
    pub fn new(tiers: Vec<Arc<dyn Store>>) -> Self {
        Self { tiers }
    }

    /// A chain with no tiers; every operation is a no-op
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of tiers
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Tiers, nearest first
    pub fn tiers(&self) -> &[Arc<dyn Store>] {
        &self.tiers
    }

    /// Ask tiers near to far, returning the first `Ok`. When every tier
    /// fails, the farthest tier's error is returned.
    fn first_ok<T>(
        &self,
        op: &'static str,
        key: &str,
        empty: T,
        mut call: impl FnMut(&dyn Store) -> Result<T>,
    ) -> Result<T> {
        let mut last_err = None;
        for (tier, store) in self.tiers.iter().enumerate() {
            match call(store.as_ref()) {
                Ok(value) => {
                    debug!(op, key, tier, store = store.name(), "chain read answered");
                    return Ok(value);
                }
                Err(e) => {
                    debug!(op, key, tier, store = store.name(), error = %e, "chain read falling through");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(empty),
        }
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tiers.iter().map(|t| t.name()).collect();
        f.debug_struct("Chain").field("tiers", &names).finish()
    }
}

impl Store for Chain {
    fn name(&self) -> &str {
        "chain"
    }

    #[instrument(level = "debug", skip(self, value), fields(tiers = self.tiers.len(), len = value.len()))]
    fn put_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        for (tier, store) in self.tiers.iter().enumerate().rev() {
            if let Err(e) = store.put_ttl(key, value, ttl) {
                debug!(tier, store = store.name(), error = %e, "chain write stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.first_ok("get", key, None, |store| store.get(key))
    }

    #[instrument(level = "debug", skip(self, reader), fields(tiers = self.tiers.len()))]
    fn put_reader_ttl(
        &self,
        key: &str,
        reader: &mut dyn Read,
        size: i64,
        ttl: Duration,
    ) -> Result<()> {
        // A reader can only be consumed once, so buffer it and give every
        // tier its own cursor.
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let size = buf.len() as i64;

        for (tier, store) in self.tiers.iter().enumerate().rev() {
            let mut cursor = Cursor::new(buf.as_slice());
            if let Err(e) = store.put_reader_ttl(key, &mut cursor, size, ttl) {
                debug!(tier, store = store.name(), error = %e, "chain streamed write stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    fn get_reader(&self, key: &str) -> Result<Option<Box<dyn Read + Send>>> {
        self.first_ok("get_reader", key, None, |store| store.get_reader(key))
    }

    fn exist(&self, key: &str) -> Result<bool> {
        for (tier, store) in self.tiers.iter().enumerate() {
            match store.exist(key) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    debug!(key, tier, store = store.name(), error = %e, "chain exist ignoring tier error");
                }
            }
        }
        Ok(false)
    }

    #[instrument(level = "debug", skip(self), fields(tiers = self.tiers.len()))]
    fn delete(&self, key: &str) -> Result<()> {
        for (tier, store) in self.tiers.iter().enumerate() {
            if let Err(e) = store.delete(key) {
                debug!(tier, store = store.name(), error = %e, "chain delete stopped");
                return Err(e);
            }
        }
        Ok(())
    }

    fn ttl(&self, key: &str) -> Result<Duration> {
        self.first_ok("ttl", key, Duration::ZERO, |store| store.ttl(key))
    }

    fn range_keys(&self, prefix: &str, limit: &str, max: usize) -> Result<KeyInfoList> {
        self.first_ok("range_keys", prefix, KeyInfoList::new(), |store| {
            store.range_keys(prefix, limit, max)
        })
    }

    fn range(&self, prefix: &str, limit: &str, visit: &mut Visitor<'_>) -> Result<()> {
        // Gather every tier's window first so keys are visited in one
        // ascending order; nearer tiers shadow farther ones.
        let mut merged: BTreeMap<String, Bytes> = BTreeMap::new();

        for (tier, store) in self.tiers.iter().enumerate() {
            let outcome = store.range(prefix, limit, &mut |key, value| {
                merged
                    .entry(key.to_string())
                    .or_insert_with(|| Bytes::copy_from_slice(value));
                true
            });
            if let Err(e) = outcome {
                debug!(tier, store = store.name(), error = %e, "chain range stopped");
                return Err(e);
            }
        }

        for (key, value) in &merged {
            if !visit(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn close(&self) -> Result<()> {
        for (tier, store) in self.tiers.iter().enumerate() {
            if let Err(e) = store.close() {
                warn!(tier, store = store.name(), error = %e, "ignoring close failure");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{KeyInfo, LruStore, MemoryStore};
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory-backed tier that records calls and can be told to fail
    struct Probe {
        name: &'static str,
        inner: MemoryStore,
        journal: Arc<Mutex<Vec<String>>>,
        fail_writes: AtomicBool,
        fail_reads: AtomicBool,
        fail_deletes: AtomicBool,
        fail_close: AtomicBool,
    }

    impl Probe {
        fn new(name: &'static str, journal: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                inner: MemoryStore::named(name),
                journal: Arc::clone(journal),
                fail_writes: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
                fail_deletes: AtomicBool::new(false),
                fail_close: AtomicBool::new(false),
            })
        }

        fn record(&self, op: &str) {
            self.journal.lock().push(format!("{}:{}", op, self.name));
        }

        fn check(&self, flag: &AtomicBool) -> Result<()> {
            if flag.load(Ordering::SeqCst) {
                Err(StoreError::backend(self.name, "injected failure"))
            } else {
                Ok(())
            }
        }
    }

    impl Store for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn put_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
            self.record("put");
            self.check(&self.fail_writes)?;
            self.inner.put_ttl(key, value, ttl)
        }

        fn get(&self, key: &str) -> Result<Option<Bytes>> {
            self.record("get");
            self.check(&self.fail_reads)?;
            self.inner.get(key)
        }

        fn exist(&self, key: &str) -> Result<bool> {
            self.record("exist");
            self.check(&self.fail_reads)?;
            self.inner.exist(key)
        }

        fn delete(&self, key: &str) -> Result<()> {
            self.record("delete");
            self.check(&self.fail_deletes)?;
            self.inner.delete(key)
        }

        fn ttl(&self, key: &str) -> Result<Duration> {
            self.check(&self.fail_reads)?;
            self.inner.ttl(key)
        }

        fn range_keys(&self, prefix: &str, limit: &str, max: usize) -> Result<KeyInfoList> {
            self.check(&self.fail_reads)?;
            self.inner.range_keys(prefix, limit, max)
        }

        fn range(&self, prefix: &str, limit: &str, visit: &mut Visitor<'_>) -> Result<()> {
            self.record("range");
            self.check(&self.fail_reads)?;
            self.inner.range(prefix, limit, visit)
        }

        fn close(&self) -> Result<()> {
            self.record("close");
            self.check(&self.fail_close)
        }
    }

    fn two_tier() -> (Chain, Arc<Probe>, Arc<Probe>, Arc<Mutex<Vec<String>>>) {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let near = Probe::new("near", &journal);
        let far = Probe::new("far", &journal);
        let chain = Chain::new(vec![near.clone(), far.clone()]);
        (chain, near, far, journal)
    }

    #[test]
    fn test_empty_chain_is_noop() {
        let chain = Chain::empty();
        assert!(chain.is_empty());
        chain.put("k", b"v").unwrap();
        assert_eq!(chain.get("k").unwrap(), None);
        assert!(!chain.exist("k").unwrap());
        assert_eq!(chain.ttl("k").unwrap(), Duration::ZERO);
        assert!(chain.range_keys("", "", 10).unwrap().is_empty());
        chain.delete("k").unwrap();
        chain.close().unwrap();
    }

    #[test]
    fn test_writes_go_far_first() {
        let (chain, _near, _far, journal) = two_tier();
        chain.put("a", b"1").unwrap();
        assert_eq!(*journal.lock(), vec!["put:far", "put:near"]);
    }

    #[test]
    fn test_far_write_failure_keeps_near_clean() {
        let (chain, near, far, _journal) = two_tier();
        far.fail_writes.store(true, Ordering::SeqCst);

        let err = chain.put("a", b"1").unwrap_err();
        assert_matches!(err, StoreError::Backend { ref store, .. } if store == "far");
        assert!(!near.inner.exist("a").unwrap());
    }

    #[test]
    fn test_near_write_failure_leaves_far_written() {
        let (chain, near, far, _journal) = two_tier();
        near.fail_writes.store(true, Ordering::SeqCst);

        assert!(chain.put("a", b"1").is_err());
        assert!(far.inner.exist("a").unwrap());
    }

    #[test]
    fn test_get_answers_from_first_ok_tier() {
        let (chain, near, far, journal) = two_tier();
        far.inner.put("a", b"far-value").unwrap();

        // near answers "no error, empty" and shadows the far tier
        assert_eq!(chain.get("a").unwrap(), None);
        assert_eq!(*journal.lock(), vec!["get:near"]);

        near.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(chain.get("a").unwrap().unwrap().as_ref(), b"far-value");
    }

    #[test]
    fn test_get_falls_through_explicit_not_found() {
        let far = Arc::new(MemoryStore::named("far"));
        far.put("a", b"durable").unwrap();
        let chain = Chain::new(vec![Arc::new(LruStore::new(4)), far]);

        assert_eq!(chain.get("a").unwrap().unwrap().as_ref(), b"durable");
        assert_eq!(chain.ttl("a").unwrap(), crate::store::TTL_INFINITE);
    }

    #[test]
    fn test_get_all_tiers_failing_returns_farthest_error() {
        let (chain, near, far, _journal) = two_tier();
        near.fail_reads.store(true, Ordering::SeqCst);
        far.fail_reads.store(true, Ordering::SeqCst);

        let err = chain.get("a").unwrap_err();
        assert_matches!(err, StoreError::Backend { ref store, .. } if store == "far");
    }

    #[test]
    fn test_exist_scans_until_true() {
        let (chain, near, far, _journal) = two_tier();
        assert!(!chain.exist("a").unwrap());

        far.inner.put("a", b"1").unwrap();
        near.fail_reads.store(true, Ordering::SeqCst);
        assert!(chain.exist("a").unwrap());
    }

    #[test]
    fn test_delete_goes_near_first_and_stops() {
        let (chain, near, far, journal) = two_tier();
        chain.put("a", b"1").unwrap();
        journal.lock().clear();

        near.fail_deletes.store(true, Ordering::SeqCst);
        assert!(chain.delete("a").is_err());
        assert_eq!(*journal.lock(), vec!["delete:near"]);
        assert!(far.inner.exist("a").unwrap());

        near.fail_deletes.store(false, Ordering::SeqCst);
        chain.delete("a").unwrap();
        assert!(!chain.exist("a").unwrap());
    }

    #[test]
    fn test_range_keys_first_ok_tier() {
        let (chain, near, far, _journal) = two_tier();
        far.inner.put("k1", b"abc").unwrap();
        near.fail_reads.store(true, Ordering::SeqCst);

        let keys = chain.range_keys("k", "", 10).unwrap();
        assert_eq!(keys.into_inner(), vec![KeyInfo::new("k1", 3)]);
    }

    #[test]
    fn test_range_shadows_and_stops() {
        let (chain, near, far, _journal) = two_tier();
        near.inner.put("a", b"near").unwrap();
        far.inner.put("a", b"far").unwrap();
        far.inner.put("b", b"far").unwrap();
        far.inner.put("c", b"far").unwrap();

        let mut seen = Vec::new();
        chain
            .range("", "", &mut |k, v| {
                seen.push((k.to_string(), v.to_vec()));
                true
            })
            .unwrap();
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), b"near".to_vec()),
                ("b".to_string(), b"far".to_vec()),
                ("c".to_string(), b"far".to_vec()),
            ]
        );

        let mut count = 0;
        chain
            .range("", "", &mut |_, _| {
                count += 1;
                count < 2
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_range_is_ascending_across_tiers() {
        let (chain, near, far, _journal) = two_tier();
        near.inner.put("z", b"near").unwrap();
        far.inner.put("a", b"far").unwrap();
        far.inner.put("m", b"far").unwrap();

        let mut seen = Vec::new();
        chain
            .range("", "", &mut |k, _| {
                seen.push(k.to_string());
                true
            })
            .unwrap();
        assert_eq!(seen, vec!["a", "m", "z"]);

        let mut streamed = Vec::new();
        chain
            .range_reader("", "", &mut |k, reader| {
                let mut value = Vec::new();
                reader.read_to_end(&mut value).unwrap();
                streamed.push((k.to_string(), value));
                true
            })
            .unwrap();
        assert_eq!(
            streamed,
            vec![
                ("a".to_string(), b"far".to_vec()),
                ("m".to_string(), b"far".to_vec()),
                ("z".to_string(), b"near".to_vec()),
            ]
        );
    }

    #[test]
    fn test_range_stops_on_tier_error() {
        let (chain, near, far, journal) = two_tier();
        far.inner.put("a", b"1").unwrap();
        near.fail_reads.store(true, Ordering::SeqCst);

        let mut visited = 0;
        assert!(chain
            .range("", "", &mut |_, _| {
                visited += 1;
                true
            })
            .is_err());
        assert_eq!(visited, 0);
        assert_eq!(*journal.lock(), vec!["range:near"]);
    }

    #[test]
    fn test_streamed_write_reaches_every_tier() {
        let (chain, near, far, _journal) = two_tier();
        let mut input: &[u8] = b"payload";
        chain.put_reader("s", &mut input, -1).unwrap();

        assert_eq!(near.inner.get("s").unwrap().unwrap().as_ref(), b"payload");
        assert_eq!(far.inner.get("s").unwrap().unwrap().as_ref(), b"payload");
    }

    #[test]
    fn test_close_ignores_failures() {
        let (chain, near, _far, journal) = two_tier();
        near.fail_close.store(true, Ordering::SeqCst);

        chain.close().unwrap();
        assert_eq!(*journal.lock(), vec!["close:near", "close:far"]);
    }

    #[test]
    fn test_debug_lists_tiers() {
        let (chain, _near, _far, _journal) = two_tier();
        assert_eq!(format!("{:?}", chain), r#"Chain { tiers: ["near", "far"] }"#);
    }
}
