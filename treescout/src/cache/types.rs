//! Persisted cache record types and the key schema.
//!
//! Records are serialized as JSON and carry a schema version; a record
//! whose version does not match [`SCHEMA_VERSION`] is treated as absent
//! by every reader. Keys are namespaced strings so multiple record kinds
//! can share one physical store:
//!
//! ```text
//! v1:tree:dir:<path>     directory listing
//! v1:tree:root:<source>  root entry for a scan source
//! v1:tree:meta:<path>    reserved for per-path metadata
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;
use crate::time::now_ms;
use crate::tree::{NodeKind, TreeNode};

/// Cache record schema version. Bump when the record layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Prefix shared by every tree cache key.
pub const KEY_PREFIX: &str = "v1:tree:";

const DIR_PREFIX: &str = "v1:tree:dir:";
const ROOT_PREFIX: &str = "v1:tree:root:";
const META_PREFIX: &str = "v1:tree:meta:";

pub fn dir_key(path: &str) -> String {
    format!("{DIR_PREFIX}{path}")
}

pub fn root_key(source: &str) -> String {
    format!("{ROOT_PREFIX}{source}")
}

pub fn meta_key(path: &str) -> String {
    format!("{META_PREFIX}{path}")
}

/// Extract the directory path from a `v1:tree:dir:` key.
pub fn path_from_dir_key(key: &str) -> Option<&str> {
    key.strip_prefix(DIR_PREFIX)
}

/// Internal cache failures. Never escape the cache boundary; the public
/// surface degrades them to misses and dropped writes.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Child entry inside a cached directory listing.
///
/// File-only fields (`size`, `last_modified`) are present only for files;
/// `is_loaded` only for directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChildEntry {
    pub kind: NodeKind,
    pub name: String,
    pub path: String,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_modified: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_loaded: Option<bool>,
}

impl CachedChildEntry {
    pub fn from_node(node: &TreeNode) -> Self {
        let is_file = node.kind == NodeKind::File;
        Self {
            kind: node.kind,
            name: node.name.clone(),
            path: node.path.clone(),
            depth: node.depth,
            parent_path: node.parent_path.clone(),
            size: if is_file { node.size } else { None },
            last_modified: if is_file { node.modified_ms } else { None },
            is_loaded: if is_file { None } else { Some(node.is_loaded.unwrap_or(false)) },
        }
    }

    pub fn to_node(&self) -> TreeNode {
        match self.kind {
            NodeKind::File => TreeNode::file(
                self.name.clone(),
                self.path.clone(),
                self.depth,
                self.parent_path.clone(),
                self.size,
                self.last_modified,
            ),
            NodeKind::Dir => {
                let mut node = TreeNode::dir(
                    self.name.clone(),
                    self.path.clone(),
                    self.depth,
                    self.parent_path.clone(),
                    Vec::new(),
                );
                node.is_loaded = Some(self.is_loaded.unwrap_or(false));
                node
            }
        }
    }
}

/// Persisted projection of a scanned directory node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDirectoryEntry {
    pub version: u32,
    pub path: String,
    pub name: String,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_path: Option<String>,
    /// When this record was written, epoch milliseconds.
    pub cached_at: u64,
    /// Directory mtime as known at cache-write time. Absent means unknown.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_modified: Option<u64>,
    pub is_loaded: bool,
    pub children: Vec<CachedChildEntry>,
}

impl CachedDirectoryEntry {
    /// Project a directory node into a cache record.
    ///
    /// An explicit `mtime` (the observed modification signal at scan time)
    /// takes precedence over whatever the node itself carries.
    pub fn from_node(node: &TreeNode, mtime: Option<u64>) -> Self {
        Self {
            version: SCHEMA_VERSION,
            path: node.path.clone(),
            name: node.name.clone(),
            depth: node.depth,
            parent_path: node.parent_path.clone(),
            cached_at: now_ms(),
            last_modified: mtime.or(node.modified_ms),
            is_loaded: node.is_loaded.unwrap_or(true),
            children: node.children.iter().map(CachedChildEntry::from_node).collect(),
        }
    }

    /// Rebuild a one-level tree node from this record.
    pub fn to_node(&self) -> TreeNode {
        let mut node = TreeNode::dir(
            self.name.clone(),
            self.path.clone(),
            self.depth,
            self.parent_path.clone(),
            self.children.iter().map(CachedChildEntry::to_node).collect(),
        );
        node.is_loaded = Some(self.is_loaded);
        node.modified_ms = self.last_modified;
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dir() -> TreeNode {
        let mut node = TreeNode::dir(
            "src",
            "/repo/src",
            1,
            Some("/repo".into()),
            vec![
                TreeNode::file("a.rs", "/repo/src/a.rs", 2, Some("/repo/src".into()), Some(10), Some(5)),
                TreeNode::unloaded_dir("deep", "/repo/src/deep", 2, Some("/repo/src".into())),
            ],
        );
        node.modified_ms = Some(1000);
        node
    }

    #[test]
    fn key_schema_is_namespaced() {
        assert_eq!(dir_key("/a"), "v1:tree:dir:/a");
        assert_eq!(root_key("proj"), "v1:tree:root:proj");
        assert_eq!(meta_key("/a"), "v1:tree:meta:/a");
        assert_eq!(path_from_dir_key("v1:tree:dir:/a/b"), Some("/a/b"));
        assert_eq!(path_from_dir_key("v1:tree:root:proj"), None);
    }

    #[test]
    fn node_round_trips_through_entry() {
        let node = sample_dir();
        let entry = CachedDirectoryEntry::from_node(&node, None);
        assert_eq!(entry.version, SCHEMA_VERSION);
        assert_eq!(entry.last_modified, Some(1000));

        let back = entry.to_node();
        assert_eq!(back.path, node.path);
        assert_eq!(back.name, node.name);
        assert_eq!(back.depth, node.depth);
        assert_eq!(back.children.len(), 2);
        assert_eq!(back.children[0].size, Some(10));
        assert!(back.children[1].is_unloaded_dir());
    }

    #[test]
    fn explicit_mtime_wins_over_node_mtime() {
        let node = sample_dir();
        let entry = CachedDirectoryEntry::from_node(&node, Some(2000));
        assert_eq!(entry.last_modified, Some(2000));
    }

    #[test]
    fn file_only_fields_are_dropped_for_dirs() {
        let mut dir_child = TreeNode::dir("d", "/d", 1, None, vec![]);
        dir_child.size = Some(99);
        dir_child.modified_ms = Some(42);
        let entry = CachedChildEntry::from_node(&dir_child);
        assert_eq!(entry.size, None);
        assert_eq!(entry.last_modified, None);
        assert_eq!(entry.is_loaded, Some(true));
    }

    #[test]
    fn json_skips_absent_optionals() {
        let child = CachedChildEntry::from_node(&TreeNode::file("f", "/f", 1, None, None, None));
        let json = serde_json::to_string(&child).unwrap();
        assert!(!json.contains("parent_path"));
        assert!(!json.contains("is_loaded"));
    }
}
