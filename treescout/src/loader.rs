//! Scan primitive: loading a directory's immediate children.
//!
//! The coordinator only depends on the [`DirectoryLoader`] trait. The
//! contract mirrors the collaborator it abstracts: `Ok(None)` means the
//! target timed out or vanished and should be skipped without noise,
//! `Err` is reported through the error callback, and either way the walk
//! continues. [`FsDirectoryLoader`] is the shipped implementation over
//! the real filesystem.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::cache::RemoteCacheView;
use crate::store::BoxFuture;
use crate::time::system_time_ms;
use crate::tree::{ScanTarget, TreeNode};

/// Default per-directory read timeout.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors surfaced by scan collaborators.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("indexing failed: {0}")]
    Index(String),
}

/// Capability to scan one directory target.
pub trait DirectoryLoader: Send + Sync {
    /// Load the immediate children of `target`.
    ///
    /// Must resolve to `Ok(None)` on timeout rather than hang or fail;
    /// the coordinator silently skips such targets.
    fn load_directory(
        &self,
        target: ScanTarget,
    ) -> BoxFuture<'_, Result<Option<TreeNode>, ScanError>>;

    /// Loader name for logging.
    fn name(&self) -> &str {
        "loader"
    }
}

/// Filesystem-backed loader using `tokio::fs`.
///
/// Optionally consults a [`RemoteCacheView`] first, comparing the
/// directory's real mtime against the cached record so cache population
/// happens at the point of scan.
pub struct FsDirectoryLoader {
    read_timeout: Duration,
    remote_cache: Option<Arc<RemoteCacheView>>,
}

impl Default for FsDirectoryLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FsDirectoryLoader {
    pub fn new() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            remote_cache: None,
        }
    }

    /// Set the per-directory read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Consult (and populate) a remote cache view around each scan.
    pub fn with_remote_cache(mut self, cache: Arc<RemoteCacheView>) -> Self {
        self.remote_cache = Some(cache);
        self
    }

    async fn read_children(target: &ScanTarget, dir_mtime: Option<u64>) -> std::io::Result<TreeNode> {
        let base = target.path.trim_end_matches('/');
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        let mut entries = tokio::fs::read_dir(&target.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let child_path = format!("{base}/{name}");
            let child_depth = target.depth + 1;
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                // Entry disappeared between listing and stat; skip it.
                Err(_) => continue,
            };
            if file_type.is_dir() {
                dirs.push(TreeNode::unloaded_dir(
                    name,
                    child_path,
                    child_depth,
                    Some(target.path.clone()),
                ));
            } else {
                let metadata = entry.metadata().await.ok();
                let size = metadata.as_ref().map(|m| m.len());
                let modified = metadata
                    .as_ref()
                    .and_then(|m| m.modified().ok())
                    .and_then(system_time_ms);
                files.push(TreeNode::file(
                    name,
                    child_path,
                    child_depth,
                    Some(target.path.clone()),
                    size,
                    modified,
                ));
            }
        }

        dirs.sort_by(|a, b| a.name.cmp(&b.name));
        files.sort_by(|a, b| a.name.cmp(&b.name));
        let mut children = dirs;
        children.append(&mut files);

        let mut node = TreeNode::dir(
            target.name.clone(),
            target.path.clone(),
            target.depth,
            target.parent_path.clone(),
            children,
        );
        node.modified_ms = dir_mtime;
        Ok(node)
    }
}

impl DirectoryLoader for FsDirectoryLoader {
    fn load_directory(
        &self,
        target: ScanTarget,
    ) -> BoxFuture<'_, Result<Option<TreeNode>, ScanError>> {
        Box::pin(async move {
            let dir_mtime = tokio::fs::metadata(&target.path)
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .and_then(system_time_ms);

            if let Some(cache) = &self.remote_cache {
                if cache.is_fresh(&target.path, dir_mtime).await {
                    if let Some(node) = cache.get_cached(&target.path).await {
                        trace!(path = %target.path, "served from remote cache view");
                        return Ok(Some(node));
                    }
                }
            }

            let scanned =
                tokio::time::timeout(self.read_timeout, Self::read_children(&target, dir_mtime))
                    .await;
            match scanned {
                Ok(Ok(node)) => {
                    if let Some(cache) = &self.remote_cache {
                        cache.put_scanned(&node, dir_mtime).await;
                    }
                    Ok(Some(node))
                }
                Ok(Err(e)) => Err(ScanError::Read {
                    path: target.path.clone(),
                    message: e.to_string(),
                }),
                Err(_) => {
                    trace!(path = %target.path, "directory read timed out, skipping");
                    Ok(None)
                }
            }
        })
    }

    fn name(&self) -> &str {
        "fs"
    }
}
