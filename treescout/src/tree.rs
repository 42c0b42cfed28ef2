//! Tree data model shared across the scan and cache subsystems.
//!
//! Nodes are immutable value objects: components build new nodes rather
//! than mutating ones received across a boundary. A directory child with
//! `is_loaded == Some(false)` is known to exist but has not been scanned
//! yet; that flag is what drives re-enqueueing in the scan coordinator.

use serde::{Deserialize, Serialize};

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Dir,
    File,
}

/// A node in the (partially) discovered directory tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub name: String,
    pub path: String,
    pub depth: u32,
    pub parent_path: Option<String>,
    /// File size in bytes. Only present for files.
    pub size: Option<u64>,
    /// Modification time in milliseconds since the UNIX epoch, if observed.
    pub modified_ms: Option<u64>,
    /// For directories: whether the children list reflects a real scan.
    /// `Some(false)` marks a placeholder awaiting its first scan.
    pub is_loaded: Option<bool>,
    /// Ordered children. Always empty for files.
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a directory node with the given children.
    pub fn dir(
        name: impl Into<String>,
        path: impl Into<String>,
        depth: u32,
        parent_path: Option<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            kind: NodeKind::Dir,
            name: name.into(),
            path: path.into(),
            depth,
            parent_path,
            size: None,
            modified_ms: None,
            is_loaded: Some(true),
            children,
        }
    }

    /// Create an unscanned directory placeholder.
    pub fn unloaded_dir(
        name: impl Into<String>,
        path: impl Into<String>,
        depth: u32,
        parent_path: Option<String>,
    ) -> Self {
        let mut node = Self::dir(name, path, depth, parent_path, Vec::new());
        node.is_loaded = Some(false);
        node
    }

    /// Create a file node.
    pub fn file(
        name: impl Into<String>,
        path: impl Into<String>,
        depth: u32,
        parent_path: Option<String>,
        size: Option<u64>,
        modified_ms: Option<u64>,
    ) -> Self {
        Self {
            kind: NodeKind::File,
            name: name.into(),
            path: path.into(),
            depth,
            parent_path,
            size,
            modified_ms,
            is_loaded: None,
            children: Vec::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }

    /// Whether this directory node still awaits its first scan.
    pub fn is_unloaded_dir(&self) -> bool {
        self.is_dir() && self.is_loaded == Some(false)
    }

    /// Directory children that have not been scanned yet.
    pub fn unloaded_dir_children(&self) -> impl Iterator<Item = &TreeNode> {
        self.children.iter().filter(|c| c.is_unloaded_dir())
    }

    /// Copy of this node with its children dropped (metadata-only view).
    pub fn without_children(&self) -> TreeNode {
        let mut node = self.clone();
        node.children = Vec::new();
        node
    }
}

/// Identifies a directory awaiting a scan. Identity is `path`; the scan
/// queues deduplicate targets by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub path: String,
    pub name: String,
    pub depth: u32,
    pub parent_path: Option<String>,
}

impl ScanTarget {
    /// Build a target from a directory node.
    pub fn for_node(node: &TreeNode) -> Self {
        Self {
            path: node.path.clone(),
            name: node.name.clone(),
            depth: node.depth,
            parent_path: node.parent_path.clone(),
        }
    }
}

/// Every ancestor of `path`, nearest first, ending at `/` (or the bare
/// top segment for relative paths). Computed by trimming `/`-segments.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let mut ancestors = Vec::new();
    let mut current = path.trim_end_matches('/');
    while let Some(idx) = current.rfind('/') {
        if idx == 0 {
            if current != "/" {
                ancestors.push("/".to_string());
            }
            break;
        }
        current = &current[..idx];
        ancestors.push(current.to_string());
    }
    ancestors
}
