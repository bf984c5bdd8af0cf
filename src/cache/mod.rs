//! Cache Module
//!
//! Keys, entries, freshness and the in-memory layer of the memoizer.

mod entry;
mod key;
mod memory;
mod stats;


// Re-export public types
pub use entry::{
    current_timestamp_ms, expires_at, is_fresh, CacheEntry, Clock, ManualClock, SystemClock,
    Timestamp,
};
pub use key::{CacheKey, KeyScope, OperationId};
pub use memory::MemoryCache;
pub use stats::MemoStats;
pub(crate) use stats::StatsRecorder;

// == Public Constants ==
/// TTL used when none is configured (1_000_000 s, roughly 11.5 days).
pub const DEFAULT_TTL_SECS: u64 = 1_000_000;
