//! Expiry Envelope Codec
//!
//! Every value written through a backend without native expiry is stored as
//!
//! ```text
//! ┌────────────────────────────┬──────────────────────────┐
//! │ expiry: u32 BE (4 bytes)   │ payload (opaque bytes)   │
//! │ seconds since epoch, 0=∞   │                          │
//! └────────────────────────────┴──────────────────────────┘
//! ```
//!
//! The layout is shared by all tiers so mixed chains stay interoperable.
//! Expiry seconds fit a `u32` until 2106.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use chrono::{DateTime, TimeZone, Utc};

use super::TTL_INFINITE;

/// Length of the expiry header
pub const HEADER_LEN: usize = 4;

/// Current time in whole seconds since the Unix epoch
pub fn now_secs() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// Wrap `payload` with an expiry `ttl` from now. A zero `ttl` never expires.
pub fn encode(ttl: Duration, payload: &[u8]) -> Bytes {
    encode_at(now_secs(), ttl, payload)
}

/// Wrap `payload` with an expiry `ttl` from `now` (seconds since epoch).
///
/// Sub-second TTLs truncate to zero seconds and are already expired when
/// read back.
pub fn encode_at(now: u64, ttl: Duration, payload: &[u8]) -> Bytes {
    let expires_at = if ttl.is_zero() {
        0
    } else {
        u32::try_from(now.saturating_add(ttl.as_secs())).unwrap_or(u32::MAX)
    };

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u32(expires_at);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode an envelope against the current time.
///
/// Returns `None` for blobs shorter than the header; readers treat those as
/// absent.
pub fn decode(raw: &Bytes) -> Option<Envelope> {
    decode_at(raw, now_secs())
}

/// Decode an envelope against `now` (seconds since epoch)
pub fn decode_at(raw: &Bytes, now: u64) -> Option<Envelope> {
    if raw.len() < HEADER_LEN {
        return None;
    }
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&raw[..HEADER_LEN]);
    let expires_at = u32::from_be_bytes(header);

    Some(Envelope {
        valid: expires_at == 0 || u64::from(expires_at) > now,
        expires_at,
        payload: raw.slice(HEADER_LEN..),
    })
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    valid: bool,
    expires_at: u32,
    payload: Bytes,
}

impl Envelope {
    /// False once a non-zero expiry has passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Raw expiry in seconds since epoch, 0 when the entry never expires
    pub fn expires_at(&self) -> u32 {
        self.expires_at
    }

    /// Expiry as a timestamp, `None` when the entry never expires
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        if self.expires_at == 0 {
            return None;
        }
        Utc.timestamp_opt(i64::from(self.expires_at), 0).single()
    }

    /// Remaining time to live relative to now
    pub fn remaining(&self) -> Duration {
        self.remaining_at(now_secs())
    }

    /// Remaining time to live relative to `now`; zero once expired
    pub fn remaining_at(&self, now: u64) -> Duration {
        if self.expires_at == 0 {
            return TTL_INFINITE;
        }
        Duration::from_secs(u64::from(self.expires_at).saturating_sub(now))
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

// =============================================================================
// Tests
// =============================================================================
