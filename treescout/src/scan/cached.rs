//! Cache-aware layer over the scan coordinator.
//!
//! `CachedLoader` wraps any [`DirectoryLoader`] with a freshness-checked
//! read-through cache, and `CacheAwareCoordinator` wires that loader
//! into a [`ScanCoordinator`] plus root-entry warm start: a cached root
//! tree is delivered immediately so a consumer has something to show
//! while the drain revalidates in the background.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{DirectoryCache, DirectoryCacheStats};
use crate::indexer::FileIndexer;
use crate::loader::{DirectoryLoader, ScanError};
use crate::store::{BoxFuture, RecordStore};
use crate::time::system_time_ms;
use crate::tree::{ScanTarget, TreeNode};

use super::config::CoordinatorConfig;
use super::events::{ScanEvents, ScanStatus};
use super::coordinator::ScanCoordinator;

/// Read-through caching wrapper around another loader.
///
/// On a fresh cache hit the inner loader is never invoked. Every
/// successful inner load is written back unconditionally.
pub struct CachedLoader {
    loader: Arc<dyn DirectoryLoader>,
    cache: Arc<DirectoryCache>,
    probe_mtime: bool,
}

impl CachedLoader {
    pub fn new(loader: Arc<dyn DirectoryLoader>, cache: Arc<DirectoryCache>) -> Self {
        Self {
            loader,
            cache,
            probe_mtime: true,
        }
    }

    /// Disable the filesystem mtime probe. Without an observed mtime a
    /// cached entry is always treated as fresh.
    pub fn without_mtime_probe(mut self) -> Self {
        self.probe_mtime = false;
        self
    }

    async fn observed_mtime(&self, path: &str) -> Option<u64> {
        if !self.probe_mtime {
            return None;
        }
        let meta = tokio::fs::metadata(path).await.ok()?;
        meta.modified().ok().and_then(system_time_ms)
    }
}

impl DirectoryLoader for CachedLoader {
    fn load_directory(
        &self,
        target: ScanTarget,
    ) -> BoxFuture<'_, Result<Option<TreeNode>, ScanError>> {
        Box::pin(async move {
            let observed = self.observed_mtime(&target.path).await;
            if let Some(entry) = self.cache.get(&target.path).await {
                if DirectoryCache::entry_is_fresh(&entry, observed) {
                    debug!(path = %target.path, "fresh cache hit, skipping load");
                    return Ok(Some(entry.to_node()));
                }
            }
            let result = self.loader.load_directory(target.clone()).await?;
            if let Some(node) = &result {
                let mtime = observed.or(node.modified_ms);
                self.cache.set(&target.path, node, mtime).await;
            }
            Ok(result)
        })
    }

    fn name(&self) -> &str {
        "cached"
    }
}

/// A [`ScanCoordinator`] whose loads run through a [`DirectoryCache`],
/// with cached-root warm start on seed.
pub struct CacheAwareCoordinator {
    inner: ScanCoordinator,
    cache: Arc<DirectoryCache>,
    events: Arc<dyn ScanEvents>,
}

impl CacheAwareCoordinator {
    pub fn new(
        loader: Arc<dyn DirectoryLoader>,
        indexer: Arc<dyn FileIndexer>,
        events: Arc<dyn ScanEvents>,
        config: CoordinatorConfig,
        cache: Arc<DirectoryCache>,
        checkpoint_store: Option<Arc<dyn RecordStore>>,
    ) -> Self {
        let cached: Arc<dyn DirectoryLoader> =
            Arc::new(CachedLoader::new(loader, Arc::clone(&cache)));
        let inner = match checkpoint_store {
            Some(store) => ScanCoordinator::with_checkpoint_store(
                cached,
                indexer,
                Arc::clone(&events),
                config,
                store,
            ),
            None => ScanCoordinator::new(cached, indexer, Arc::clone(&events), config),
        };
        Self {
            inner,
            cache,
            events,
        }
    }

    /// Seed a scan session. If a cached root entry exists for `source`
    /// it is delivered to the consumer immediately, before any scanning
    /// starts; the supplied tree (or cached one) is then persisted and
    /// queued for revalidation.
    pub async fn seed_tree(&self, source: &str, tree: Option<&TreeNode>) {
        if let Some(entry) = self.cache.get_root(source).await {
            info!(source, "serving cached root tree");
            self.events.on_directory_loaded(&entry.to_node());
        }
        if let Some(root) = tree {
            self.cache.set_root(source, root).await;
            let mut loaded = Vec::new();
            collect_loaded_dirs(root, &mut loaded);
            self.cache.batch_set(&loaded, None).await;
        }
        self.inner.seed_tree(tree).await;
    }

    pub async fn enqueue_subtree(&self, node: &TreeNode) {
        self.inner.enqueue_subtree(node).await;
    }

    pub async fn mark_dir_loaded(&self, path: &str) {
        self.inner.mark_dir_loaded(path).await;
    }

    /// Invalidate a path plus all of its ancestors, then queue it for a
    /// rescan.
    pub async fn invalidate_path(&self, node: &TreeNode) {
        self.cache.mark_stale(&node.path).await;
        self.inner.enqueue_subtree(node).await;
    }

    pub async fn reset_for_source(&self, source: &str) {
        self.inner.reset_for_source(source).await;
    }

    pub async fn restore_checkpoint(&self, root_child_names: &[String]) -> bool {
        self.inner.restore_checkpoint(root_child_names).await
    }

    pub async fn status(&self) -> ScanStatus {
        self.inner.status().await
    }

    pub async fn cache_stats(&self) -> DirectoryCacheStats {
        self.cache.stats().await
    }

    pub fn cache(&self) -> &Arc<DirectoryCache> {
        &self.cache
    }

    pub async fn wait_idle(&self) {
        self.inner.wait_idle().await;
    }

    pub async fn dispose(&self) {
        self.inner.dispose().await;
    }
}

fn collect_loaded_dirs(node: &TreeNode, out: &mut Vec<TreeNode>) {
    if node.is_dir() && !node.is_unloaded_dir() {
        out.push(node.clone());
        for child in &node.children {
            collect_loaded_dirs(child, out);
        }
    }
}
