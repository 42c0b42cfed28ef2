//! Scan coordinator configuration.

use std::collections::HashSet;
use std::time::Duration;

use super::queue::Priority;

/// Configuration for the scan coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of concurrent worker loops.
    pub worker_count: usize,
    /// Path segments that classify a target as deferred.
    pub ignore_names: HashSet<String>,
    /// Maximum depth at which discovered directories are re-enqueued.
    pub max_depth: u32,
    /// Ceiling on directories processed per session. `None` = unbounded.
    pub max_prefetched_dirs: Option<u64>,
    /// Discovered files buffered before a flush to the indexer.
    pub index_batch_size: usize,
    /// Every Nth processed directory carries a milestone snapshot.
    pub status_sample_interval: u64,
    /// Targets processed by one worker between cooperative yields.
    pub yield_every: u32,
    /// Length of each cooperative yield.
    pub yield_delay: Duration,
    /// Newly loaded directories between opportunistic checkpoint saves.
    pub checkpoint_interval: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let ignore_names = ["node_modules", ".git", "target", "dist", "build", ".cache", "vendor"]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            worker_count: 3,
            ignore_names,
            max_depth: 12,
            max_prefetched_dirs: None,
            index_batch_size: 200,
            status_sample_interval: 50,
            yield_every: 8,
            yield_delay: Duration::from_millis(2),
            checkpoint_interval: 100,
        }
    }
}

impl CoordinatorConfig {
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    pub fn with_ignore_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_prefetched_dirs(mut self, limit: Option<u64>) -> Self {
        self.max_prefetched_dirs = limit;
        self
    }

    pub fn with_index_batch_size(mut self, size: usize) -> Self {
        self.index_batch_size = size.max(1);
        self
    }

    pub fn with_yield_delay(mut self, delay: Duration) -> Self {
        self.yield_delay = delay;
        self
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    /// Priority tier for a target path: deferred when any `/`-segment
    /// matches the ignore list, primary otherwise.
    pub fn classify(&self, path: &str) -> Priority {
        let deferred = path
            .split('/')
            .any(|segment| !segment.is_empty() && self.ignore_names.contains(segment));
        if deferred {
            Priority::Deferred
        } else {
            Priority::Primary
        }
    }
}
