//! Directory cache subsystem.
//!
//! [`DirectoryCache`] persists directory listings with freshness metadata
//! and hierarchical invalidation; [`RemoteCacheView`] is a second access
//! point over the same store for the context performing the actual walk.
//! Record shapes and the key schema live in [`types`].

mod directory_cache;
mod remote;
mod stats;
pub mod types;

pub use directory_cache::DirectoryCache;
pub use remote::RemoteCacheView;
pub use stats::DirectoryCacheStats;
pub use types::{CacheError, CachedChildEntry, CachedDirectoryEntry, SCHEMA_VERSION};
