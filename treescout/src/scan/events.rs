//! Event surface exposed to the host.
//!
//! Results are delivered through a [`ScanEvents`] sink with default no-op
//! methods, so hosts implement only what they consume. Delivery is
//! at-most-once per completed scan; ordering follows the phase rules in
//! the coordinator.

use crate::tree::TreeNode;

/// Coarse-grained telemetry snapshot attached to every Nth status event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Milestone {
    pub processed_count: u64,
    /// Time since the session started, milliseconds.
    pub elapsed_ms: u64,
    pub pending: usize,
    pub deferred: usize,
}

/// Aggregate coordinator status, emitted after every state-changing event.
#[derive(Debug, Clone, Default)]
pub struct ScanStatus {
    /// Root path of the session being drained; empty before any seed.
    pub source: String,
    pub running: bool,
    /// Targets waiting in the primary queue.
    pub pending: usize,
    /// Targets waiting in the deferred queue.
    pub deferred: usize,
    pub indexed_file_count: u64,
    pub processed_count: u64,
    pub last_duration_ms: u64,
    pub average_duration_ms: f64,
    /// Present on every `status_sample_interval`-th processed directory.
    pub milestone: Option<Milestone>,
}

/// Host-facing callbacks. All methods default to no-ops.
pub trait ScanEvents: Send + Sync {
    /// A primary directory finished scanning (full children payload).
    fn on_directory_loaded(&self, _node: &TreeNode) {}

    /// A deferred directory finished scanning. Children are omitted to
    /// bound payload size for ignored trees.
    fn on_deferred_metadata(&self, _node: &TreeNode) {}

    /// Aggregate status snapshot.
    fn on_status(&self, _status: &ScanStatus) {}

    /// A single target failed; the walk continues.
    fn on_error(&self, _message: &str) {}
}

/// Sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvents;

impl ScanEvents for NullEvents {}
