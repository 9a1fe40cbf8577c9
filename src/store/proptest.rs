//! Property-Based Tests for the store core
//!
//! # Test Properties
//!
//! 1. **Envelope Roundtrip**: decode(encode(ttl, p)).payload = p
//! 2. **Expiry**: ttl = 0 never expires; ttl > 0 expires exactly ttl seconds later
//! 3. **Range Window**: output is a sorted, contiguous slice of sorted input
//! 4. **LRU Eviction Order**: overflow evicts the oldest keys, in order

#![cfg(test)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use proptest::prelude::*;

use super::codec::{decode_at, encode_at};
use super::range::select_range;
use crate::cache::LruCache;

// =============================================================================
// Property Strategies
// =============================================================================

/// Plausible wall-clock seconds, far from the u32 horizon
fn now_strategy() -> impl Strategy<Value = u64> {
    1_000_000_000u64..2_000_000_000
}

fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..512)
}

/// Short keys over a tiny alphabet so prefixes collide often
fn key_set_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[abc]{0,3}", 0..24).prop_map(|set| set.into_iter().collect())
}

fn bound_strategy() -> impl Strategy<Value = String> {
    "[abc]{0,2}"
}

// =============================================================================
// Envelope Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the payload survives encoding for any TTL.
    #[test]
    fn prop_envelope_roundtrip(
        now in now_strategy(),
        ttl in 0u64..1_000_000,
        payload in payload_strategy(),
    ) {
        let raw = encode_at(now, Duration::from_secs(ttl), &payload);
        let envelope = decode_at(&raw, now).expect("envelope has a header");
        prop_assert_eq!(envelope.payload().as_ref(), payload.as_slice());
    }

    /// Property: a zero TTL is valid at any later time.
    #[test]
    fn prop_zero_ttl_never_expires(
        now in now_strategy(),
        later in 0u64..(u32::MAX as u64),
        payload in payload_strategy(),
    ) {
        let raw = encode_at(now, Duration::ZERO, &payload);
        prop_assert!(decode_at(&raw, later).unwrap().is_valid());
    }

    /// Property: a positive TTL is valid strictly before now + ttl, invalid from then on.
    #[test]
    fn prop_ttl_expires_on_time(
        now in now_strategy(),
        ttl in 1u64..1_000_000,
        extra in 0u64..1_000,
    ) {
        let raw = encode_at(now, Duration::from_secs(ttl), b"x");
        prop_assert!(decode_at(&raw, now + ttl - 1).unwrap().is_valid());
        prop_assert!(!decode_at(&raw, now + ttl + extra).unwrap().is_valid());
    }

    /// Property: blobs shorter than the header never decode.
    #[test]
    fn prop_short_blobs_are_absent(blob in prop::collection::vec(any::<u8>(), 0..4)) {
        prop_assert!(decode_at(&Bytes::from(blob), 0).is_none());
    }
}

// =============================================================================
// Range Window Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Property: the result is a contiguous run of the sorted input.
    #[test]
    fn prop_range_is_contiguous_sorted_slice(
        keys in key_set_strategy(),
        prefix in bound_strategy(),
        limit in bound_strategy(),
    ) {
        let mut sorted = keys.clone();
        sorted.sort();
        let out = select_range(keys, &prefix, &limit);

        prop_assert!(out.windows(2).all(|w| w[0] < w[1]));
        if !out.is_empty() {
            prop_assert!(sorted.windows(out.len()).any(|w| w == out.as_slice()));
        }
    }

    /// Property: the window starts at the first prefix match and stops before
    /// the first limit match after it.
    #[test]
    fn prop_range_bounds(
        keys in key_set_strategy(),
        prefix in bound_strategy(),
        limit in bound_strategy(),
    ) {
        let mut sorted = keys.clone();
        sorted.sort();
        let out = select_range(keys, &prefix, &limit);

        let start = sorted
            .iter()
            .position(|k| !prefix.is_empty() && k.starts_with(&prefix))
            .unwrap_or(0);
        if let Some(first) = out.first() {
            prop_assert_eq!(first, &sorted[start]);
        }
        if !limit.is_empty() {
            prop_assert!(out.iter().all(|k| !k.starts_with(&limit)));
        }
        let end = start + out.len();
        if end < sorted.len() {
            prop_assert!(!limit.is_empty() && sorted[end].starts_with(&limit));
        }
    }

    /// Property: empty bounds return everything, sorted.
    #[test]
    fn prop_empty_bounds_are_identity(keys in key_set_strategy()) {
        let mut sorted = keys.clone();
        sorted.sort();
        prop_assert_eq!(select_range(keys, "", ""), sorted);
    }
}

// =============================================================================
// LRU Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: inserting capacity + k distinct keys evicts the first k, in
    /// insertion order, each exactly once.
    #[test]
    fn prop_lru_evicts_oldest_first(capacity in 1usize..32, overflow in 1usize..32) {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let cache = LruCache::with_evict(capacity, move |k: &usize, v: &usize| {
            sink.lock().push((*k, *v));
        });

        for i in 0..capacity + overflow {
            cache.add(i, i * 10);
        }

        let expected: Vec<(usize, usize)> = (0..overflow).map(|i| (i, i * 10)).collect();
        prop_assert_eq!(evicted.lock().clone(), expected);
        prop_assert_eq!(cache.len(), capacity);
        prop_assert_eq!(cache.keys(), (overflow..capacity + overflow).collect::<Vec<_>>());
    }

    /// Property: resize keeps exactly the most recently used entries.
    #[test]
    fn prop_lru_resize_keeps_newest(len in 1usize..40, target in 0usize..40) {
        let cache = LruCache::new(64);
        for i in 0..len {
            cache.add(i, ());
        }

        let evicted = cache.resize(target);
        prop_assert_eq!(evicted, len.saturating_sub(target));
        let kept = len.min(target);
        prop_assert_eq!(cache.keys(), (len - kept..len).collect::<Vec<_>>());
    }
}
