//! Cache access point for the execution context performing the walk.
//!
//! The scan primitive may run in a separate execution context from the
//! coordinator. `RemoteCacheView` gives that context its own handle over
//! the same physical store and key schema, so cache population can happen
//! at the point of scan instead of round-tripping results back first.

use std::sync::Arc;

use crate::store::RecordStore;
use crate::tree::TreeNode;

use super::directory_cache::DirectoryCache;
use super::stats::DirectoryCacheStats;

/// Independent cache instance over a shared physical store.
pub struct RemoteCacheView {
    cache: DirectoryCache,
}

impl RemoteCacheView {
    /// Open a view over the given store. The store should be the same
    /// physical one backing the coordinator-side [`DirectoryCache`].
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            cache: DirectoryCache::new("remote", store),
        }
    }

    /// Cached listing for a path, rebuilt as a one-level tree node.
    pub async fn get_cached(&self, path: &str) -> Option<TreeNode> {
        self.cache.get(path).await.map(|entry| entry.to_node())
    }

    /// Whether the cached listing is fresh against an observed mtime.
    pub async fn is_fresh(&self, path: &str, current_mtime: Option<u64>) -> bool {
        self.cache.is_fresh(path, current_mtime).await
    }

    /// Persist a just-scanned directory at the point of scan.
    pub async fn put_scanned(&self, node: &TreeNode, mtime: Option<u64>) {
        self.cache.set(&node.path, node, mtime).await;
    }

    pub async fn stats(&self) -> DirectoryCacheStats {
        self.cache.stats().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn shares_records_with_coordinator_side_cache() {
        let store = MemoryStore::new();
        let local = DirectoryCache::new("local", Arc::new(store.clone()));
        let remote = RemoteCacheView::new(Arc::new(store));

        let mut node = TreeNode::dir("d", "/d", 0, None, vec![]);
        node.modified_ms = Some(10);
        remote.put_scanned(&node, Some(10)).await;

        // Written at the point of scan, visible through the local cache.
        let entry = local.get("/d").await.expect("visible across views");
        assert_eq!(entry.last_modified, Some(10));

        let back = remote.get_cached("/d").await.expect("visible remotely");
        assert_eq!(back.path, "/d");
        assert!(remote.is_fresh("/d", Some(10)).await);
        assert!(!remote.is_fresh("/d", Some(11)).await);
    }
}
