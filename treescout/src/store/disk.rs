//! On-disk record store.
//!
//! Each record is one file in a flat directory. Keys can contain characters
//! that are unsafe in filenames (the cache keys embed whole paths), so the
//! filename is an FNV-1a hash of the key and the key itself is written as
//! the first line of the file, followed by the raw record bytes:
//!
//! ```text
//! {root}/{fnv1a64(key):016x}.rec
//!
//! v1:tree:dir:/repo/src\n
//! <record bytes>
//! ```
//!
//! Writes go through a temp file and rename so a crash never leaves a
//! half-written record behind.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BoxFuture, RecordStore, StoreError};

const RECORD_EXTENSION: &str = "rec";

/// Record store persisting each record as a file under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    /// Open a disk store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "disk record store opened");
        Ok(Self { root })
    }

    /// Directory this store persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{:016x}.{}", fnv1a64(key.as_bytes()), RECORD_EXTENSION))
    }

    /// Split a record file into its key line and value bytes.
    ///
    /// Returns `None` when the file has no key line; the stored key is
    /// compared against the requested one to rule out hash collisions.
    fn split_record(bytes: &[u8]) -> Option<(&str, &[u8])> {
        let newline = bytes.iter().position(|b| *b == b'\n')?;
        let key = std::str::from_utf8(&bytes[..newline]).ok()?;
        Some((key, &bytes[newline + 1..]))
    }
}

/// 64-bit FNV-1a, used only to derive stable filenames.
fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

impl RecordStore for DiskStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Vec<u8>>, StoreError>> {
        let path = self.record_path(key);
        let key = key.to_string();
        Box::pin(async move {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(StoreError::Io(e)),
            };
            match DiskStore::split_record(&bytes) {
                Some((stored_key, value)) if stored_key == key => Ok(Some(value.to_vec())),
                Some(_) => Ok(None),
                None => Err(StoreError::Malformed {
                    key,
                    message: "missing key header line".to_string(),
                }),
            }
        })
    }

    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'static, Result<(), StoreError>> {
        let path = self.record_path(key);
        let key = key.to_string();
        Box::pin(async move {
            let mut payload = Vec::with_capacity(key.len() + 1 + value.len());
            payload.extend_from_slice(key.as_bytes());
            payload.push(b'\n');
            payload.extend_from_slice(&value);

            let tmp = path.with_extension("tmp");
            tokio::fs::write(&tmp, &payload).await?;
            tokio::fs::rename(&tmp, &path).await?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, Result<bool, StoreError>> {
        let path = self.record_path(key);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'static, Result<Vec<String>, StoreError>> {
        let root = self.root.clone();
        Box::pin(async move {
            let mut keys = Vec::new();
            let mut entries = tokio::fs::read_dir(&root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if !path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                    continue;
                }
                let bytes = match tokio::fs::read(&path).await {
                    Ok(bytes) => bytes,
                    // Record may have been deleted or replaced mid-listing.
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(StoreError::Io(e)),
                };
                if let Some((key, _)) = DiskStore::split_record(&bytes) {
                    keys.push(key.to_string());
                }
            }
            Ok(keys)
        })
    }

    fn clear(&self) -> BoxFuture<'static, Result<(), StoreError>> {
        let root = self.root.clone();
        Box::pin(async move {
            let mut entries = tokio::fs::read_dir(&root).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(StoreError::Io(e)),
                    }
                }
            }
            Ok(())
        })
    }
}
