//! File indexing collaborator.
//!
//! The coordinator batches newly discovered files and hands them to a
//! [`FileIndexer`] so a search index can be built alongside the walk.
//! Indexing is best-effort: failures are logged and swallowed, never
//! allowed to stall the scan.

use serde::{Deserialize, Serialize};

use crate::loader::ScanError;
use crate::store::BoxFuture;
use crate::tree::NodeKind;

/// One discovered entry handed to the indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: String,
    pub kind: NodeKind,
}

/// Consumer of discovered file paths.
pub trait FileIndexer: Send + Sync {
    /// Ingest a batch of discovered entries.
    fn index_files(&self, entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<(), ScanError>>;

    /// Indexer name for logging.
    fn name(&self) -> &str {
        "indexer"
    }
}

/// Indexer that drops everything. Used when no search index is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullIndexer;

impl FileIndexer for NullIndexer {
    fn index_files(&self, _entries: Vec<IndexEntry>) -> BoxFuture<'_, Result<(), ScanError>> {
        Box::pin(async { Ok(()) })
    }

    fn name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_indexer_accepts_batches() {
        let indexer = NullIndexer;
        let entries = vec![IndexEntry {
            path: "/a/b.rs".to_string(),
            kind: NodeKind::File,
        }];
        assert!(indexer.index_files(entries).await.is_ok());
    }
}
