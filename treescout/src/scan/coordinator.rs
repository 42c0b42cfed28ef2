//! Priority/worker-pool scan coordinator.
//!
//! The coordinator owns two insertion-ordered target queues and runs a
//! bounded number of cooperative worker loops over them. Primary targets
//! drain first; deferred targets are picked up once the primary queue is
//! empty, and a worker that sees an empty primary queue while another
//! still holds a primary job pulls from deferred instead of idling.
//! Primary results are buffered and flushed in bulk when the last primary
//! job finishes, so result delivery never violates phase order even
//! though scan execution interleaves.
//!
//! Cancellation is cooperative: every session is tagged with a monotonic
//! token, checked at the top of each loop iteration and after every
//! await. `reset_for_source` bumps the token and waits for the in-flight
//! drain to observe it; there are no abort calls into workers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::checkpoint::{generate_shape_fingerprint, SessionCheckpoint};
use crate::indexer::{FileIndexer, IndexEntry};
use crate::loader::DirectoryLoader;
use crate::store::RecordStore;
use crate::tree::{ScanTarget, TreeNode};

use super::config::CoordinatorConfig;
use super::events::{Milestone, ScanEvents, ScanStatus};
use super::queue::{Priority, TargetQueue};

/// Coordinates prefetch scanning for one source at a time.
///
/// Cloning shares the underlying coordinator.
#[derive(Clone)]
pub struct ScanCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    loader: Arc<dyn DirectoryLoader>,
    indexer: Arc<dyn FileIndexer>,
    events: Arc<dyn ScanEvents>,
    config: CoordinatorConfig,
    /// Monotonic session token; bumped on reset and dispose.
    session: AtomicU64,
    disposed: AtomicBool,
    shutdown: CancellationToken,
    state: Mutex<ScanState>,
    idle_tx: watch::Sender<bool>,
    idle_rx: watch::Receiver<bool>,
    checkpoint_store: Option<Arc<dyn RecordStore>>,
}

/// Shared mutable session state. Only ever mutated while the lock is
/// held, between await points.
struct ScanState {
    source: String,
    queue: TargetQueue,
    loaded: HashSet<String>,
    active_primary: usize,
    active_deferred: usize,
    primary_phase_complete: bool,
    primary_buffer: Vec<TreeNode>,
    deferred_buffer: Vec<TreeNode>,
    index_batch: Vec<IndexEntry>,
    indexed_file_count: u64,
    processed_count: u64,
    last_duration_ms: u64,
    duration_total_ms: u64,
    running_workers: usize,
    loaded_since_checkpoint: usize,
    root_fingerprint: String,
    started: Instant,
}

impl ScanState {
    fn new(source: String) -> Self {
        Self {
            source,
            queue: TargetQueue::new(),
            loaded: HashSet::new(),
            active_primary: 0,
            active_deferred: 0,
            primary_phase_complete: false,
            primary_buffer: Vec::new(),
            deferred_buffer: Vec::new(),
            index_batch: Vec::new(),
            indexed_file_count: 0,
            processed_count: 0,
            last_duration_ms: 0,
            duration_total_ms: 0,
            running_workers: 0,
            loaded_since_checkpoint: 0,
            root_fingerprint: String::new(),
            started: Instant::now(),
        }
    }

    fn status_snapshot(&self, with_milestone: bool) -> ScanStatus {
        let average_duration_ms = if self.processed_count == 0 {
            0.0
        } else {
            self.duration_total_ms as f64 / self.processed_count as f64
        };
        let milestone = with_milestone.then(|| Milestone {
            processed_count: self.processed_count,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
            pending: self.queue.primary_len(),
            deferred: self.queue.deferred_len(),
        });
        ScanStatus {
            source: self.source.clone(),
            running: self.running_workers > 0,
            pending: self.queue.primary_len(),
            deferred: self.queue.deferred_len(),
            indexed_file_count: self.indexed_file_count,
            processed_count: self.processed_count,
            last_duration_ms: self.last_duration_ms,
            average_duration_ms,
            milestone,
        }
    }
}

impl ScanCoordinator {
    /// Create a coordinator without checkpoint persistence.
    pub fn new(
        loader: Arc<dyn DirectoryLoader>,
        indexer: Arc<dyn FileIndexer>,
        events: Arc<dyn ScanEvents>,
        config: CoordinatorConfig,
    ) -> Self {
        Self::build(loader, indexer, events, config, None)
    }

    /// Create a coordinator that persists session checkpoints into the
    /// given store.
    pub fn with_checkpoint_store(
        loader: Arc<dyn DirectoryLoader>,
        indexer: Arc<dyn FileIndexer>,
        events: Arc<dyn ScanEvents>,
        config: CoordinatorConfig,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        Self::build(loader, indexer, events, config, Some(store))
    }

    fn build(
        loader: Arc<dyn DirectoryLoader>,
        indexer: Arc<dyn FileIndexer>,
        events: Arc<dyn ScanEvents>,
        config: CoordinatorConfig,
        checkpoint_store: Option<Arc<dyn RecordStore>>,
    ) -> Self {
        let (idle_tx, idle_rx) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                loader,
                indexer,
                events,
                config,
                session: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
                shutdown: CancellationToken::new(),
                state: Mutex::new(ScanState::new(String::new())),
                idle_tx,
                idle_rx,
                checkpoint_store,
            }),
        }
    }

    /// Ingest an already-known (partial) tree: every loaded directory is
    /// recorded, every unscanned child becomes a target. No-op on `None`.
    pub async fn seed_tree(&self, tree: Option<&TreeNode>) {
        let Some(root) = tree else { return };
        let status = {
            let mut st = self.inner.state.lock().await;
            let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
            st.root_fingerprint = generate_shape_fingerprint(&names);
            if st.source.is_empty() {
                // Seeded without a prior reset; the root itself names the
                // session source.
                st.source = root.path.clone();
            }
            self.inner.ingest_node(&mut st, root);
            Inner::spawn_workers(&self.inner, &mut st);
            debug!(
                source = %st.source,
                pending = st.queue.primary_len(),
                deferred = st.queue.deferred_len(),
                loaded = st.loaded.len(),
                "tree seeded"
            );
            st.status_snapshot(false)
        };
        self.inner.events.on_status(&status);
    }

    /// Re-ingest a just-discovered subtree, dropping any pre-existing
    /// queue entry for the same path first.
    pub async fn enqueue_subtree(&self, node: &TreeNode) {
        let status = {
            let mut st = self.inner.state.lock().await;
            st.queue.remove(&node.path);
            if node.is_unloaded_dir() {
                // Presented as unscanned again, e.g. after invalidation.
                st.loaded.remove(&node.path);
            }
            self.inner.ingest_node(&mut st, node);
            Inner::spawn_workers(&self.inner, &mut st);
            st.status_snapshot(false)
        };
        self.inner.events.on_status(&status);
    }

    /// Declare a path already scanned so it is skipped from future
    /// enqueues until invalidated.
    pub async fn mark_dir_loaded(&self, path: &str) {
        let status = {
            let mut st = self.inner.state.lock().await;
            st.loaded.insert(path.to_string());
            st.queue.remove(path);
            st.status_snapshot(false)
        };
        self.inner.events.on_status(&status);
    }

    /// Cancel all in-flight work for the previous session and start a
    /// fresh one for `source`. Returns once the old drain has fully
    /// observed the cancellation; no stale events follow.
    pub async fn reset_for_source(&self, source: &str) {
        self.inner.session.fetch_add(1, Ordering::SeqCst);
        self.inner.wait_idle().await;
        let mut st = self.inner.state.lock().await;
        *st = ScanState::new(source.to_string());
        info!(source, "scan coordinator reset");
    }

    /// Try to resume from a persisted checkpoint. The checkpoint is
    /// applied only when the root shape fingerprint still matches;
    /// otherwise it is discarded and the session starts clean.
    pub async fn restore_checkpoint(&self, root_child_names: &[String]) -> bool {
        let Some(store) = &self.inner.checkpoint_store else {
            return false;
        };
        let Some(checkpoint) = SessionCheckpoint::load(store).await else {
            return false;
        };
        let fingerprint = generate_shape_fingerprint(root_child_names);
        if checkpoint.shape_fingerprint != fingerprint {
            debug!("checkpoint fingerprint mismatch, starting clean");
            SessionCheckpoint::discard(store).await;
            return false;
        }
        let mut st = self.inner.state.lock().await;
        let restored = checkpoint.loaded_dir_paths.len();
        st.root_fingerprint = fingerprint;
        st.indexed_file_count = checkpoint.indexed_file_count;
        for path in checkpoint.loaded_dir_paths {
            st.queue.remove(&path);
            st.loaded.insert(path);
        }
        info!(restored, "resumed from session checkpoint");
        true
    }

    /// Current aggregate status.
    pub async fn status(&self) -> ScanStatus {
        self.inner.state.lock().await.status_snapshot(false)
    }

    /// Wait until no worker loop is running.
    pub async fn wait_idle(&self) {
        self.inner.wait_idle().await;
    }

    /// Permanent shutdown: cancels workers, flushes buffered index
    /// writes, and releases session state.
    pub async fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.session.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown.cancel();
        self.inner.wait_idle().await;

        let batch = {
            let mut st = self.inner.state.lock().await;
            std::mem::take(&mut st.index_batch)
        };
        self.inner.flush_index(batch).await;

        let mut st = self.inner.state.lock().await;
        *st = ScanState::new(String::new());
        info!("scan coordinator disposed");
    }
}

impl Inner {
    fn cancelled(&self, token: u64) -> bool {
        self.disposed.load(Ordering::SeqCst)
            || self.shutdown.is_cancelled()
            || self.session.load(Ordering::SeqCst) != token
    }

    async fn wait_idle(&self) {
        let mut rx = self.idle_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Walk a seeded subtree: loaded dirs are recorded, unscanned dirs
    /// within the depth limit become targets.
    fn ingest_node(&self, st: &mut ScanState, node: &TreeNode) {
        if !node.is_dir() {
            return;
        }
        if node.is_unloaded_dir() {
            if !st.loaded.contains(&node.path) && node.depth <= self.config.max_depth {
                let priority = self.config.classify(&node.path);
                st.queue.insert(ScanTarget::for_node(node), priority);
            }
            return;
        }
        st.loaded.insert(node.path.clone());
        for child in &node.children {
            self.ingest_node(st, child);
        }
    }

    /// Top up worker loops for the current session, bounded by the
    /// configured worker count and the amount of queued work.
    fn spawn_workers(this: &Arc<Inner>, st: &mut ScanState) {
        if this.disposed.load(Ordering::SeqCst) {
            return;
        }
        let token = this.session.load(Ordering::SeqCst);
        let wanted = st.queue.len().min(this.config.worker_count);
        while st.running_workers < wanted {
            st.running_workers += 1;
            let _ = this.idle_tx.send(false);
            let inner = Arc::clone(this);
            tokio::spawn(async move {
                inner.worker_loop(token).await;
            });
        }
    }

    async fn worker_loop(self: Arc<Self>, token: u64) {
        trace!(token, "worker loop started");
        let mut since_yield: u32 = 0;
        loop {
            if self.cancelled(token) {
                break;
            }
            let job = {
                let mut st = self.state.lock().await;
                if let Some(limit) = self.config.max_prefetched_dirs {
                    if st.processed_count >= limit && !st.queue.is_empty() {
                        debug!(limit, "prefetch budget exhausted, clearing queues");
                        st.queue.clear();
                    }
                }
                match st.queue.pop_next() {
                    Some((target, priority)) => {
                        match priority {
                            Priority::Primary => st.active_primary += 1,
                            Priority::Deferred => st.active_deferred += 1,
                        }
                        Some((target, priority))
                    }
                    None => None,
                }
            };
            let Some((target, priority)) = job else { break };

            let started = Instant::now();
            let outcome = self.loader.load_directory(target.clone()).await;
            if self.cancelled(token) {
                // Session torn down mid-scan: drop the result on the floor.
                break;
            }
            match outcome {
                Ok(result) => {
                    Inner::complete_scan(&self, &target, priority, result, started.elapsed()).await;
                }
                Err(e) => {
                    self.events
                        .on_error(&format!("scan failed for {}: {}", target.path, e));
                    Inner::complete_scan(&self, &target, priority, None, started.elapsed()).await;
                }
            }

            since_yield += 1;
            if since_yield >= self.config.yield_every {
                since_yield = 0;
                // Brief yield so a shared event loop never starves.
                tokio::time::sleep(self.config.yield_delay).await;
            }
        }
        self.worker_exit(token).await;
    }

    /// Settle one dequeued target: record the result, expand newly
    /// discovered children, reconcile phase completion, and emit events.
    async fn complete_scan(
        this: &Arc<Inner>,
        target: &ScanTarget,
        priority: Priority,
        result: Option<TreeNode>,
        elapsed: Duration,
    ) {
        let processed_now = result.is_some();
        let mut emit_loaded: Vec<TreeNode> = Vec::new();
        let mut emit_deferred: Vec<TreeNode> = Vec::new();
        let mut index_flush: Option<Vec<IndexEntry>> = None;
        let mut checkpoint: Option<SessionCheckpoint> = None;
        let status;
        {
            let mut st = this.state.lock().await;
            if let Some(node) = result {
                st.loaded.insert(target.path.clone());
                st.loaded_since_checkpoint += 1;

                for child in node.unloaded_dir_children() {
                    if child.depth <= this.config.max_depth && !st.loaded.contains(&child.path) {
                        let child_priority = this.config.classify(&child.path);
                        st.queue.insert(ScanTarget::for_node(child), child_priority);
                    }
                }
                // Discovered children grow the queue; top the pool up so
                // the drain actually runs at the configured concurrency.
                Inner::spawn_workers(this, &mut st);
                for child in node.children.iter().filter(|c| !c.is_dir()) {
                    st.index_batch.push(IndexEntry {
                        path: child.path.clone(),
                        kind: child.kind,
                    });
                    st.indexed_file_count += 1;
                }
                if st.index_batch.len() >= this.config.index_batch_size {
                    index_flush = Some(std::mem::take(&mut st.index_batch));
                }

                st.processed_count += 1;
                st.last_duration_ms = elapsed.as_millis() as u64;
                st.duration_total_ms += st.last_duration_ms;

                match priority {
                    Priority::Primary => {
                        if st.primary_phase_complete {
                            emit_loaded.push(node);
                        } else {
                            st.primary_buffer.push(node);
                        }
                    }
                    Priority::Deferred => {
                        let meta = node.without_children();
                        if st.primary_phase_complete {
                            emit_deferred.push(meta);
                        } else {
                            st.deferred_buffer.push(meta);
                        }
                    }
                }

                if st.loaded_since_checkpoint >= this.config.checkpoint_interval {
                    st.loaded_since_checkpoint = 0;
                    checkpoint = this.checkpoint_snapshot(&st);
                }
            }

            match priority {
                Priority::Primary => st.active_primary = st.active_primary.saturating_sub(1),
                Priority::Deferred => st.active_deferred = st.active_deferred.saturating_sub(1),
            }

            if !st.primary_phase_complete && st.active_primary == 0 && st.queue.primary_len() == 0 {
                st.primary_phase_complete = true;
                debug!(
                    processed = st.processed_count,
                    buffered = st.primary_buffer.len(),
                    "primary phase complete, flushing buffered results"
                );
                // Flush while holding the lock: no other worker can slip
                // a deferred delivery in ahead of the buffered primaries.
                for node in st.primary_buffer.drain(..) {
                    this.events.on_directory_loaded(&node);
                }
                for node in st.deferred_buffer.drain(..) {
                    this.events.on_deferred_metadata(&node);
                }
            }

            let with_milestone = processed_now
                && st.processed_count > 0
                && st.processed_count % this.config.status_sample_interval == 0;
            status = st.status_snapshot(with_milestone);
        }

        if let Some(batch) = index_flush {
            this.flush_index(batch).await;
        }
        for node in &emit_loaded {
            this.events.on_directory_loaded(node);
        }
        for node in &emit_deferred {
            this.events.on_deferred_metadata(node);
        }
        this.events.on_status(&status);
        if let Some(checkpoint) = checkpoint {
            this.save_checkpoint(checkpoint).await;
        }
    }

    async fn worker_exit(&self, token: u64) {
        let mut final_flush: Vec<IndexEntry> = Vec::new();
        let mut checkpoint: Option<SessionCheckpoint> = None;
        let mut final_status: Option<ScanStatus> = None;
        {
            let mut st = self.state.lock().await;
            st.running_workers = st.running_workers.saturating_sub(1);
            if st.running_workers == 0 && !self.cancelled(token) {
                final_flush = std::mem::take(&mut st.index_batch);
                checkpoint = self.checkpoint_snapshot(&st);
                final_status = Some(st.status_snapshot(false));
            }
        }

        self.flush_index(final_flush).await;
        if let Some(checkpoint) = checkpoint {
            self.save_checkpoint(checkpoint).await;
        }
        if let Some(status) = final_status {
            self.events.on_status(&status);
            debug!(
                processed = status.processed_count,
                indexed = status.indexed_file_count,
                "drain complete"
            );
        }

        // Signal idle only if no worker was spawned meanwhile.
        let st = self.state.lock().await;
        if st.running_workers == 0 {
            let _ = self.idle_tx.send(true);
        }
    }

    async fn flush_index(&self, batch: Vec<IndexEntry>) {
        if batch.is_empty() {
            return;
        }
        let count = batch.len();
        if let Err(e) = self.indexer.index_files(batch).await {
            warn!(count, error = %e, "index batch dropped");
        } else {
            trace!(count, "index batch flushed");
        }
    }

    fn checkpoint_snapshot(&self, st: &ScanState) -> Option<SessionCheckpoint> {
        self.checkpoint_store.as_ref()?;
        let mut paths: Vec<String> = st.loaded.iter().cloned().collect();
        paths.sort_unstable();
        Some(SessionCheckpoint::new(
            paths,
            st.indexed_file_count,
            st.root_fingerprint.clone(),
        ))
    }

    async fn save_checkpoint(&self, checkpoint: SessionCheckpoint) {
        if let Some(store) = &self.checkpoint_store {
            checkpoint.save(store).await;
        }
    }
}
