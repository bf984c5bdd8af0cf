//! Cache Entry Module
//!
//! Defines cached results with their absolute expiry, the freshness rule,
//! and the clock the engine reads time from.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unix timestamp in milliseconds.
pub type Timestamp = i64;

// == Cache Entry ==
/// An encoded result together with the instant it stops being reusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Encoded result value
    pub result: Vec<u8>,
    /// Expiration timestamp (Unix milliseconds), exclusive
    pub expires_at: Timestamp,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl` after `now`.
    pub fn new(result: Vec<u8>, now: Timestamp, ttl: Duration) -> Self {
        Self {
            result,
            expires_at: expires_at(now, ttl),
        }
    }

    // == Is Fresh ==
    /// Returns true while `now` is strictly before the expiry.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        is_fresh(self.expires_at, now)
    }
}

// == Freshness Policy ==
/// An entry is fresh iff `now < expires_at`.
///
/// The boundary instant counts as stale: once the TTL has fully elapsed the
/// entry is no longer served.
pub fn is_fresh(expires_at: Timestamp, now: Timestamp) -> bool {
    now < expires_at
}

/// Computes `now + ttl`, saturating at the end of the timestamp range.
pub fn expires_at(now: Timestamp, ttl: Duration) -> Timestamp {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now.saturating_add(ttl_ms)
}

// == Clock ==
/// Source of wall-clock time for expiry decisions.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time as Unix milliseconds.
    fn now(&self) -> Timestamp;
}

/// Reads the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        current_timestamp_ms()
    }
}

/// A clock that only moves when told to. Useful for exercising expiry
/// without sleeping.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let ms = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, to: Timestamp) {
        self.now.store(to, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as 0.
pub fn current_timestamp_ms() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
