//! Memo Statistics Module
//!
//! Tracks how calls were served: from memory, from the durable store, or by
//! running the operation.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Memo Stats ==
/// Snapshot of memoizer counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MemoStats {
    /// Calls answered by the in-memory layer
    pub memory_hits: u64,
    /// Calls answered by the durable store after hydration
    pub durable_hits: u64,
    /// Calls that found nothing fresh in either layer
    pub misses: u64,
    /// Times the underlying operation actually ran
    pub recomputes: u64,
    /// Current number of entries in memory
    pub total_entries: usize,
}

impl MemoStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no calls have been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by concurrent callers.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    recomputes: AtomicU64,
}

impl StatsRecorder {
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_durable_hit(&self) {
        self.durable_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_recompute(&self) {
        self.recomputes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, total_entries: usize) -> MemoStats {
        MemoStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            recomputes: self.recomputes.load(Ordering::Relaxed),
            total_entries,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::default().snapshot(0);
        assert_eq!(stats, MemoStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(MemoStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_both_layers() {
        let recorder = StatsRecorder::default();
        recorder.record_memory_hit();
        recorder.record_durable_hit();
        recorder.record_miss();
        recorder.record_miss();

        let stats = recorder.snapshot(3);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.total_entries, 3);
    }

    #[test]
    fn test_record_recompute() {
        let recorder = StatsRecorder::default();
        recorder.record_recompute();
        recorder.record_recompute();
        assert_eq!(recorder.snapshot(0).recomputes, 2);
    }
}
