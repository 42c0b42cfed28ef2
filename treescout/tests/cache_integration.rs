//! Integration tests for the directory cache over a real disk store,
//! plus the cache-aware coordinator end to end.
//!
//! Run with: `cargo test --test cache_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use treescout::cache::{DirectoryCache, RemoteCacheView};
use treescout::indexer::NullIndexer;
use treescout::loader::{DirectoryLoader, ScanError};
use treescout::scan::{CacheAwareCoordinator, CoordinatorConfig, NullEvents, ScanEvents};
use treescout::store::{BoxFuture, DiskStore, MemoryStore, RecordStore};
use treescout::tree::{NodeKind, ScanTarget, TreeNode};

fn file(name: &str, parent: &str, depth: u32, size: u64) -> TreeNode {
    TreeNode::file(
        name,
        format!("{parent}/{name}"),
        depth,
        Some(parent.to_string()),
        Some(size),
        Some(1_700_000_000_000),
    )
}

fn src_dir() -> TreeNode {
    TreeNode::dir(
        "src",
        "/project/src",
        1,
        Some("/project".to_string()),
        vec![
            file("main.rs", "/project/src", 2, 2_048),
            file("lib.rs", "/project/src", 2, 512),
            file("config.rs", "/project/src", 2, 4_096),
        ],
    )
}

#[tokio::test]
async fn disk_round_trip_preserves_child_metadata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(DiskStore::open(dir.path()).await.expect("open store"));
    let cache = DirectoryCache::new("disk", store);

    let node = src_dir();
    cache.set("/project/src", &node, Some(5_000)).await;

    let entry = cache.get("/project/src").await.expect("cached entry");
    assert_eq!(entry.last_modified, Some(5_000));

    let restored = entry.to_node();
    assert_eq!(restored.path, "/project/src");
    assert_eq!(restored.children.len(), 3);
    let sizes: HashMap<&str, Option<u64>> = restored
        .children
        .iter()
        .map(|c| (c.name.as_str(), c.size))
        .collect();
    assert_eq!(sizes["main.rs"], Some(2_048));
    assert_eq!(sizes["lib.rs"], Some(512));
    assert_eq!(sizes["config.rs"], Some(4_096));
    assert!(restored.children.iter().all(|c| c.kind == NodeKind::File));
}

#[tokio::test]
async fn disk_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let store = Arc::new(DiskStore::open(dir.path()).await.expect("open store"));
        let cache = DirectoryCache::new("disk", store);
        cache.set("/project/src", &src_dir(), Some(5_000)).await;
    }

    let store = Arc::new(DiskStore::open(dir.path()).await.expect("reopen store"));
    let cache = DirectoryCache::new("disk", store);
    let entry = cache.get("/project/src").await.expect("persisted entry");
    assert_eq!(entry.children.len(), 3);
}

#[tokio::test]
async fn remote_view_shares_entries_with_local_cache() {
    let store = Arc::new(MemoryStore::new());
    let remote = RemoteCacheView::new(Arc::clone(&store) as Arc<dyn RecordStore>);
    let local = DirectoryCache::new("local", store);

    remote.put_scanned(&src_dir(), Some(7_000)).await;
    // Written through the remote view, readable as a plain cache entry.
    assert!(local.is_fresh("/project/src", Some(6_000)).await);
    assert!(!local.is_fresh("/project/src", Some(8_000)).await);
}

// ============================================================================
// Cache-aware coordinator
// ============================================================================

struct CountingLoader {
    dirs: HashMap<String, TreeNode>,
    calls: AtomicUsize,
}

impl DirectoryLoader for CountingLoader {
    fn load_directory(
        &self,
        target: ScanTarget,
    ) -> BoxFuture<'_, Result<Option<TreeNode>, ScanError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let node = self.dirs.get(&target.path).cloned();
        Box::pin(async move {
            node.ok_or(ScanError::Read {
                path: target.path,
                message: "missing".to_string(),
            })
            .map(Some)
        })
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[derive(Default)]
struct LoadedPaths {
    paths: Mutex<Vec<String>>,
}

impl ScanEvents for LoadedPaths {
    fn on_directory_loaded(&self, node: &TreeNode) {
        self.paths.lock().unwrap().push(node.path.clone());
    }
}

fn project_root() -> TreeNode {
    TreeNode::dir(
        "project",
        "/project",
        0,
        None,
        vec![TreeNode::unloaded_dir(
            "src",
            "/project/src",
            1,
            Some("/project".to_string()),
        )],
    )
}

fn coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig::default()
        .with_worker_count(1)
        .with_yield_delay(Duration::from_millis(0))
}

#[tokio::test]
async fn second_session_scans_from_cache() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(DirectoryCache::new("project", Arc::clone(&store) as Arc<dyn RecordStore>));
    let mut dirs = HashMap::new();
    dirs.insert("/project/src".to_string(), src_dir());

    let first_loader = Arc::new(CountingLoader {
        dirs: dirs.clone(),
        calls: AtomicUsize::new(0),
    });
    let first = CacheAwareCoordinator::new(
        first_loader.clone(),
        Arc::new(NullIndexer),
        Arc::new(NullEvents),
        coordinator_config(),
        Arc::clone(&cache),
        None,
    );
    first.seed_tree("/project", Some(&project_root())).await;
    first.wait_idle().await;
    assert_eq!(first_loader.calls.load(Ordering::SeqCst), 1);

    // Same source, warm cache: the inner loader never runs. The mock
    // tree has no on-disk counterpart so the mtime probe yields nothing
    // and the entry counts as fresh.
    let second_loader = Arc::new(CountingLoader {
        dirs,
        calls: AtomicUsize::new(0),
    });
    let second = CacheAwareCoordinator::new(
        second_loader.clone(),
        Arc::new(NullIndexer),
        Arc::new(NullEvents),
        coordinator_config(),
        Arc::clone(&cache),
        None,
    );
    second.seed_tree("/project", Some(&project_root())).await;
    second.wait_idle().await;
    assert_eq!(second_loader.calls.load(Ordering::SeqCst), 0);

    let stats = second.cache_stats().await;
    assert!(stats.hit_rate > 0.0);
}

#[tokio::test]
async fn cached_root_is_served_before_scanning() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(DirectoryCache::new("project", Arc::clone(&store) as Arc<dyn RecordStore>));
    cache.set_root("/project", &project_root()).await;

    let events = Arc::new(LoadedPaths::default());
    let warm = CacheAwareCoordinator::new(
        Arc::new(CountingLoader {
            dirs: HashMap::new(),
            calls: AtomicUsize::new(0),
        }),
        Arc::new(NullIndexer),
        events.clone(),
        coordinator_config(),
        cache,
        None,
    );
    warm.seed_tree("/project", None).await;

    let paths = events.paths.lock().unwrap().clone();
    assert_eq!(paths, vec!["/project"]);
}

#[tokio::test]
async fn invalidate_path_forces_rescan() {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(DirectoryCache::new("project", Arc::clone(&store) as Arc<dyn RecordStore>));
    let mut dirs = HashMap::new();
    dirs.insert("/project/src".to_string(), src_dir());

    let loader = Arc::new(CountingLoader {
        dirs,
        calls: AtomicUsize::new(0),
    });
    let coordinator = CacheAwareCoordinator::new(
        loader.clone(),
        Arc::new(NullIndexer),
        Arc::new(NullEvents),
        coordinator_config(),
        Arc::clone(&cache),
        None,
    );
    coordinator.seed_tree("/project", Some(&project_root())).await;
    coordinator.wait_idle().await;
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    let stale = TreeNode::unloaded_dir("src", "/project/src", 1, Some("/project".to_string()));
    coordinator.invalidate_path(&stale).await;
    coordinator.wait_idle().await;

    // Entry was dropped, so the rescan goes back to the loader.
    assert_eq!(loader.calls.load(Ordering::SeqCst), 2);
}
