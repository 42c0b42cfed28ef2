//! TreeScout - background filesystem tree prefetch and caching
//!
//! This library drains a project's directory tree in the background so
//! a consumer (an editor pane, a search index) never waits on a cold
//! `readdir`. Scanning runs through a priority worker pool; results are
//! persisted to a versioned directory cache with mtime-based freshness,
//! and sessions can resume from a shape-fingerprinted checkpoint.
//!
//! # High-Level API
//!
//! Most callers wire a loader, an indexer, and an event sink into a
//! cache-aware coordinator:
//!
//! ```ignore
//! use std::sync::Arc;
//! use treescout::cache::DirectoryCache;
//! use treescout::indexer::NullIndexer;
//! use treescout::loader::FsDirectoryLoader;
//! use treescout::scan::{CacheAwareCoordinator, CoordinatorConfig, NullEvents};
//! use treescout::store::MemoryStore;
//!
//! let store = Arc::new(MemoryStore::new());
//! let cache = Arc::new(DirectoryCache::new("project", store));
//! let coordinator = CacheAwareCoordinator::new(
//!     Arc::new(FsDirectoryLoader::new()),
//!     Arc::new(NullIndexer),
//!     Arc::new(NullEvents),
//!     CoordinatorConfig::default(),
//!     cache,
//!     None,
//! );
//! ```

pub mod cache;
pub mod checkpoint;
pub mod indexer;
pub mod loader;
pub mod logging;
pub mod scan;
pub mod store;
pub mod time;
pub mod tree;

/// Version of the TreeScout library and CLI.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
