//! Persistent directory cache with freshness and hierarchical invalidation.
//!
//! The cache is an acceleration layer, not a source of truth: every
//! operation catches store failures at this boundary and degrades to a
//! miss (reads) or a dropped write. Callers never see an error.
//!
//! Freshness is a comparison between the mtime recorded at cache-write
//! time and an externally observed one; with no observation available the
//! cache is trusted as-is (cache-first startup mode). Invalidation is
//! hierarchical: marking a path stale also removes every ancestor's
//! listing, because a stale descendant means the parent's cached view of
//! it is suspect too.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::store::RecordStore;
use crate::time::now_ms;
use crate::tree::{ancestor_paths, TreeNode};

use super::stats::{CacheCounters, DirectoryCacheStats};
use super::types::{
    dir_key, path_from_dir_key, root_key, CacheError, CachedDirectoryEntry, KEY_PREFIX,
    SCHEMA_VERSION,
};

/// Maximum entries sampled when estimating total cache size.
const SIZE_SAMPLE_LIMIT: usize = 10;

/// Freshness- and version-aware cache of directory listings.
pub struct DirectoryCache {
    /// Logical cache name, for logging and diagnostics only.
    name: String,
    store: Arc<dyn RecordStore>,
    counters: CacheCounters,
}

impl DirectoryCache {
    /// Create a cache over the given record store.
    pub fn new(name: impl Into<String>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            name: name.into(),
            store,
            counters: CacheCounters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the cached listing for a directory path.
    ///
    /// Counts toward hit/miss statistics. Version-mismatched records are
    /// discarded and reported as misses.
    pub async fn get(&self, path: &str) -> Option<CachedDirectoryEntry> {
        let started = Instant::now();
        let entry = match self.read_entry(&dir_key(path)).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache = %self.name, path, error = %e, "cache read failed, treating as miss");
                None
            }
        };
        match entry {
            Some(entry) => {
                self.counters.record_hit(started.elapsed());
                Some(entry)
            }
            None => {
                self.counters.record_miss(started.elapsed());
                None
            }
        }
    }

    /// Write the listing for a scanned directory.
    ///
    /// `mtime` is the modification signal observed at scan time; it
    /// becomes the record's `last_modified`.
    pub async fn set(&self, path: &str, node: &TreeNode, mtime: Option<u64>) {
        let entry = CachedDirectoryEntry::from_node(node, mtime);
        if let Err(e) = self.write_entry(&dir_key(path), &entry).await {
            debug!(cache = %self.name, path, error = %e, "cache write dropped");
        }
    }

    /// Read the persisted root entry for a scan source.
    pub async fn get_root(&self, source: &str) -> Option<CachedDirectoryEntry> {
        match self.read_entry(&root_key(source)).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cache = %self.name, source, error = %e, "root read failed, treating as miss");
                None
            }
        }
    }

    /// Persist the root entry for a scan source.
    pub async fn set_root(&self, source: &str, node: &TreeNode) {
        let entry = CachedDirectoryEntry::from_node(node, node.modified_ms);
        if let Err(e) = self.write_entry(&root_key(source), &entry).await {
            debug!(cache = %self.name, source, error = %e, "root write dropped");
        }
    }

    /// Whether the cached entry for `path` is fresh against an observed
    /// mtime. Absent entry: stale. No observation: trust the cache.
    pub async fn is_fresh(&self, path: &str, current_mtime: Option<u64>) -> bool {
        match self.read_entry(&dir_key(path)).await {
            Ok(Some(entry)) => Self::entry_is_fresh(&entry, current_mtime),
            Ok(None) => false,
            Err(e) => {
                warn!(cache = %self.name, path, error = %e, "freshness read failed, treating as stale");
                false
            }
        }
    }

    /// Freshness rule for an already-loaded entry. Equal timestamps count
    /// as fresh; an entry with no recorded mtime fails validation against
    /// a real signal.
    pub fn entry_is_fresh(entry: &CachedDirectoryEntry, current_mtime: Option<u64>) -> bool {
        match current_mtime {
            None => true,
            Some(current) => entry.last_modified.is_some_and(|cached| cached >= current),
        }
    }

    /// Remove a single cached listing.
    pub async fn invalidate(&self, path: &str) {
        if let Err(e) = self.store.delete(&dir_key(path)).await {
            debug!(cache = %self.name, path, error = %e, "invalidate dropped");
        }
    }

    /// Remove the listing for `path` and for every ancestor up to `/`.
    pub async fn mark_stale(&self, path: &str) {
        self.invalidate(path).await;
        for ancestor in ancestor_paths(path) {
            self.invalidate(&ancestor).await;
        }
        trace!(cache = %self.name, path, "marked stale with ancestors");
    }

    /// Remove every cached listing at or under `path`.
    pub async fn invalidate_subtree(&self, path: &str) {
        let exact = dir_key(path);
        let prefix = format!("{}/", dir_key(path.trim_end_matches('/')));
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(cache = %self.name, path, error = %e, "subtree invalidation skipped");
                return;
            }
        };
        let mut removed = 0usize;
        for key in keys {
            if key == exact || key.starts_with(&prefix) {
                if self.store.delete(&key).await.is_ok() {
                    removed += 1;
                }
            }
        }
        debug!(cache = %self.name, path, removed, "subtree invalidated");
    }

    /// Batch sweep: re-check freshness for every cached path present in
    /// `current_mtimes` and drop the stale ones. Returns removals.
    pub async fn validate_and_cleanup_stale(&self, current_mtimes: &HashMap<String, u64>) -> usize {
        let mut removed = 0usize;
        for (path, mtime) in current_mtimes {
            let stale = match self.read_entry(&dir_key(path)).await {
                Ok(Some(entry)) => !Self::entry_is_fresh(&entry, Some(*mtime)),
                Ok(None) => false,
                Err(_) => false,
            };
            if stale {
                self.invalidate(path).await;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(cache = %self.name, removed, "stale entries cleaned up");
        }
        removed
    }

    /// Age-based sweep using `cached_at`, independent of freshness.
    /// Entries at least `max_age` old expire. Returns removals.
    pub async fn cleanup_old_entries(&self, max_age: Duration) -> usize {
        let cutoff = now_ms().saturating_sub(max_age.as_millis() as u64);
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(cache = %self.name, error = %e, "age cleanup skipped");
                return 0;
            }
        };
        let mut removed = 0usize;
        for key in keys {
            if path_from_dir_key(&key).is_none() {
                continue;
            }
            let expired = match self.read_raw_entry(&key).await {
                Ok(Some(entry)) => entry.cached_at <= cutoff,
                _ => false,
            };
            if expired && self.store.delete(&key).await.is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(cache = %self.name, removed, "aged entries cleaned up");
        }
        removed
    }

    /// Write many listings in one pass, e.g. after a recursive scan
    /// ingests a whole subtree at once.
    pub async fn batch_set(&self, nodes: &[TreeNode], mtimes: Option<&HashMap<String, u64>>) {
        for node in nodes {
            let mtime = mtimes
                .and_then(|m| m.get(&node.path).copied())
                .or(node.modified_ms);
            self.set(&node.path, node, mtime).await;
        }
        debug!(cache = %self.name, count = nodes.len(), "batch write complete");
    }

    /// Remove every `v1:tree:*` record from the store.
    pub async fn clear(&self) {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(cache = %self.name, error = %e, "cache clear skipped");
                return;
            }
        };
        for key in keys {
            if key.starts_with(KEY_PREFIX) {
                let _ = self.store.delete(&key).await;
            }
        }
    }

    /// Statistics snapshot. The size estimate samples at most
    /// [`SIZE_SAMPLE_LIMIT`] records and extrapolates rather than reading
    /// every entry.
    pub async fn stats(&self) -> DirectoryCacheStats {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(_) => Vec::new(),
        };
        let dir_keys: Vec<&String> = keys.iter().filter(|k| path_from_dir_key(k).is_some()).collect();
        let total_entries = dir_keys.len();

        let mut sampled_bytes = 0u64;
        let mut sampled = 0usize;
        for key in dir_keys.iter().take(SIZE_SAMPLE_LIMIT) {
            if let Ok(Some(bytes)) = self.store.get(key).await {
                sampled_bytes += bytes.len() as u64;
                sampled += 1;
            }
        }
        let estimated_size_bytes = if sampled == 0 {
            0
        } else {
            sampled_bytes / sampled as u64 * total_entries as u64
        };

        DirectoryCacheStats::from_counters(&self.counters, total_entries, estimated_size_bytes)
    }

    /// Read and decode a record, discarding version mismatches.
    async fn read_entry(&self, key: &str) -> Result<Option<CachedDirectoryEntry>, CacheError> {
        let entry = self.read_raw_entry(key).await?;
        match entry {
            Some(entry) if entry.version != SCHEMA_VERSION => {
                debug!(
                    cache = %self.name,
                    key,
                    found = entry.version,
                    expected = SCHEMA_VERSION,
                    "discarding version-mismatched record"
                );
                let _ = self.store.delete(key).await;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn read_raw_entry(&self, key: &str) -> Result<Option<CachedDirectoryEntry>, CacheError> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    async fn write_entry(&self, key: &str, entry: &CachedDirectoryEntry) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(entry)?;
        self.store.put(key, bytes).await?;
        self.counters.record_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use proptest::prelude::*;

    fn cache() -> DirectoryCache {
        DirectoryCache::new("test", Arc::new(MemoryStore::new()))
    }

    fn dir_node(path: &str, mtime: Option<u64>) -> TreeNode {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let mut node = TreeNode::dir(name, path, 1, None, vec![]);
        node.modified_ms = mtime;
        node
    }

    #[tokio::test]
    async fn get_returns_what_set_wrote() {
        let cache = cache();
        let node = TreeNode::dir(
            "src",
            "/src",
            0,
            None,
            vec![
                TreeNode::file("a.rs", "/src/a.rs", 1, Some("/src".into()), Some(100), None),
                TreeNode::file("b.rs", "/src/b.rs", 1, Some("/src".into()), Some(200), None),
                TreeNode::file("c.rs", "/src/c.rs", 1, Some("/src".into()), Some(300), None),
            ],
        );
        cache.set("/src", &node, Some(50)).await;

        let entry = cache.get("/src").await.expect("entry cached");
        assert_eq!(entry.path, "/src");
        assert_eq!(entry.name, "src");
        assert_eq!(entry.depth, 0);
        assert_eq!(entry.children.len(), 3);
        let sizes: Vec<_> = entry.children.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![Some(100), Some(200), Some(300)]);
    }

    #[tokio::test]
    async fn missing_path_is_a_miss() {
        let cache = cache();
        assert!(cache.get("/nothing").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.hit_rate, 0.0);
        assert!(stats.miss_rate > 0.0);
    }

    #[tokio::test]
    async fn freshness_boundary() {
        let cache = cache();
        cache.set("/d", &dir_node("/d", Some(1000)), Some(1000)).await;

        assert!(cache.is_fresh("/d", Some(1000)).await, "equal mtime is fresh");
        assert!(cache.is_fresh("/d", Some(999)).await, "older observation is fresh");
        assert!(!cache.is_fresh("/d", Some(1001)).await, "newer observation is stale");
        assert!(cache.is_fresh("/d", None).await, "no observation trusts cache");
        assert!(!cache.is_fresh("/absent", None).await, "absent entry is never fresh");
    }

    #[tokio::test]
    async fn unknown_recorded_mtime_fails_real_validation() {
        let cache = cache();
        cache.set("/d", &dir_node("/d", None), None).await;
        assert!(cache.is_fresh("/d", None).await);
        assert!(!cache.is_fresh("/d", Some(1)).await);
    }

    #[tokio::test]
    async fn mark_stale_removes_ancestors_but_not_siblings() {
        let cache = cache();
        for path in ["/", "/a", "/a/b", "/a/b/c", "/a/sibling"] {
            cache.set(path, &dir_node(path, Some(1)), Some(1)).await;
        }

        cache.mark_stale("/a/b/c").await;

        assert!(cache.get("/a/b/c").await.is_none());
        assert!(cache.get("/a/b").await.is_none());
        assert!(cache.get("/a").await.is_none());
        assert!(cache.get("/").await.is_none());
        assert!(cache.get("/a/sibling").await.is_some());
    }

    #[tokio::test]
    async fn subtree_invalidation_is_prefix_scoped() {
        let cache = cache();
        for path in ["/a", "/a/b", "/a/b/c", "/ab", "/z"] {
            cache.set(path, &dir_node(path, Some(1)), Some(1)).await;
        }

        cache.invalidate_subtree("/a").await;

        assert!(cache.get("/a").await.is_none());
        assert!(cache.get("/a/b").await.is_none());
        assert!(cache.get("/a/b/c").await.is_none());
        // "/ab" shares a string prefix but is not nested under "/a"
        assert!(cache.get("/ab").await.is_some());
        assert!(cache.get("/z").await.is_some());
    }

    #[tokio::test]
    async fn validate_sweep_removes_only_stale() {
        let cache = cache();
        cache.set("/fresh", &dir_node("/fresh", Some(100)), Some(100)).await;
        cache.set("/stale", &dir_node("/stale", Some(100)), Some(100)).await;

        let mut mtimes = HashMap::new();
        mtimes.insert("/fresh".to_string(), 100);
        mtimes.insert("/stale".to_string(), 200);
        mtimes.insert("/unknown".to_string(), 1);

        let removed = cache.validate_and_cleanup_stale(&mtimes).await;
        assert_eq!(removed, 1);
        assert!(cache.get("/fresh").await.is_some());
        assert!(cache.get("/stale").await.is_none());
    }

    #[tokio::test]
    async fn age_cleanup_uses_cached_at() {
        let cache = cache();
        cache.set("/old", &dir_node("/old", Some(1)), Some(1)).await;

        // Entries younger than the age limit survive a sweep.
        let removed = cache.cleanup_old_entries(Duration::from_secs(3600)).await;
        assert_eq!(removed, 0);
        assert!(cache.get("/old").await.is_some());

        // cached_at is "now"; with a zero max age everything is at least
        // that old, including an entry written in this same millisecond.
        let removed = cache.cleanup_old_entries(Duration::from_millis(0)).await;
        assert_eq!(removed, 1);
        assert!(cache.get("/old").await.is_none());
    }

    #[tokio::test]
    async fn version_mismatch_is_discarded() {
        let store = Arc::new(MemoryStore::new());
        let cache = DirectoryCache::new("test", store.clone());
        cache.set("/d", &dir_node("/d", Some(1)), Some(1)).await;

        // Corrupt the version field in place
        let key = dir_key("/d");
        let bytes = store.get(&key).await.unwrap().unwrap();
        let mut entry: CachedDirectoryEntry = serde_json::from_slice(&bytes).unwrap();
        entry.version = SCHEMA_VERSION + 1;
        store.put(&key, serde_json::to_vec(&entry).unwrap()).await.unwrap();

        assert!(cache.get("/d").await.is_none());
        // The mismatched record is also removed from the store
        assert_eq!(store.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_set_writes_all_and_applies_mtimes() {
        let cache = cache();
        let nodes = vec![dir_node("/x", None), dir_node("/y", Some(5))];
        let mut mtimes = HashMap::new();
        mtimes.insert("/x".to_string(), 77u64);

        cache.batch_set(&nodes, Some(&mtimes)).await;

        assert_eq!(cache.get("/x").await.unwrap().last_modified, Some(77));
        assert_eq!(cache.get("/y").await.unwrap().last_modified, Some(5));
    }

    #[tokio::test]
    async fn stats_counts_and_estimates() {
        let cache = cache();
        for i in 0..20 {
            let path = format!("/d{i}");
            cache.set(&path, &dir_node(&path, Some(1)), Some(1)).await;
        }
        cache.get("/d0").await;
        cache.get("/missing").await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 20);
        assert_eq!(stats.writes, 20);
        assert!(stats.estimated_size_bytes > 0);
        assert!((stats.hit_rate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn root_entry_round_trip() {
        let cache = cache();
        let root = TreeNode::dir("proj", "/proj", 0, None, vec![]);
        cache.set_root("proj", &root).await;
        let entry = cache.get_root("proj").await.unwrap();
        assert_eq!(entry.path, "/proj");
        assert!(cache.get_root("other").await.is_none());
    }

    proptest! {
        /// The freshness rule over arbitrary recorded/observed mtimes:
        /// fresh exactly when recorded >= observed.
        #[test]
        fn prop_freshness_is_at_least_as_new(cached in 0u64..u64::MAX / 2, observed in 0u64..u64::MAX / 2) {
            let mut node = TreeNode::dir("d", "/d", 0, None, vec![]);
            node.modified_ms = Some(cached);
            let entry = CachedDirectoryEntry::from_node(&node, Some(cached));
            prop_assert_eq!(
                DirectoryCache::entry_is_fresh(&entry, Some(observed)),
                cached >= observed
            );
        }
    }
}
