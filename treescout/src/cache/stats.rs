//! Hit/miss accounting for the directory cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Internal counters, updated lock-free on every cache read/write.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    /// Accumulated read latency in microseconds, across hits and misses.
    load_time_us: AtomicU64,
}

impl CacheCounters {
    pub fn record_hit(&self, elapsed: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.load_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_miss(&self, elapsed: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.load_time_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn average_load_time_ms(&self) -> f64 {
        let reads = self.hits() + self.misses();
        if reads == 0 {
            return 0.0;
        }
        self.load_time_us.load(Ordering::Relaxed) as f64 / reads as f64 / 1000.0
    }
}

/// Snapshot of directory cache statistics.
#[derive(Debug, Clone, Default)]
pub struct DirectoryCacheStats {
    /// Number of cached directory entries currently in the store.
    pub total_entries: usize,
    /// Fraction of reads answered from cache (0.0 to 1.0).
    pub hit_rate: f64,
    /// Fraction of reads that missed (0.0 to 1.0).
    pub miss_rate: f64,
    /// Total cache writes so far.
    pub writes: u64,
    /// Mean read latency in milliseconds.
    pub average_load_time_ms: f64,
    /// Estimated total record size in bytes, extrapolated from a sample.
    pub estimated_size_bytes: u64,
}

impl DirectoryCacheStats {
    pub(crate) fn from_counters(
        counters: &CacheCounters,
        total_entries: usize,
        estimated_size_bytes: u64,
    ) -> Self {
        let hits = counters.hits();
        let misses = counters.misses();
        let reads = hits + misses;
        let (hit_rate, miss_rate) = if reads == 0 {
            (0.0, 0.0)
        } else {
            (hits as f64 / reads as f64, misses as f64 / reads as f64)
        };
        Self {
            total_entries,
            hit_rate,
            miss_rate,
            writes: counters.writes(),
            average_load_time_ms: counters.average_load_time_ms(),
            estimated_size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_split_between_hits_and_misses() {
        let counters = CacheCounters::default();
        counters.record_hit(Duration::from_micros(100));
        counters.record_hit(Duration::from_micros(100));
        counters.record_miss(Duration::from_micros(400));
        counters.record_write();

        let stats = DirectoryCacheStats::from_counters(&counters, 7, 1024);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((stats.miss_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.total_entries, 7);
        assert_eq!(stats.estimated_size_bytes, 1024);
        assert!((stats.average_load_time_ms - 0.2).abs() < 1e-9);
    }

    #[test]
    fn empty_counters_report_zero_rates() {
        let counters = CacheCounters::default();
        let stats = DirectoryCacheStats::from_counters(&counters, 0, 0);
        assert_eq!(stats.hit_rate, 0.0);
        assert_eq!(stats.miss_rate, 0.0);
        assert_eq!(stats.average_load_time_ms, 0.0);
    }
}
