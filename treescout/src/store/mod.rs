//! Versioned record stores backing the directory cache and checkpoint.
//!
//! A [`RecordStore`] is a flat namespace of string keys mapping to opaque
//! byte records. The directory cache layers its `v1:tree:*` key schema on
//! top; the same trait backs the in-memory store used in tests and the
//! on-disk store used for persistence across sessions. Implementations
//! are interchangeable behind `Arc<dyn RecordStore>`.

mod disk;
mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from record store operations.
///
/// Callers above the cache boundary never see these: the directory cache
/// degrades store failures to misses and dropped writes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record for key {key}: {message}")]
    Malformed { key: String, message: String },
}

/// Flat key-value record store.
pub trait RecordStore: Send + Sync {
    /// Read the record at `key`, or `None` if absent.
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Vec<u8>>, StoreError>>;

    /// Write (or overwrite) the record at `key`.
    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'static, Result<(), StoreError>>;

    /// Remove the record at `key`. Returns whether a record existed.
    fn delete(&self, key: &str) -> BoxFuture<'static, Result<bool, StoreError>>;

    /// All keys currently present, in no particular order.
    fn keys(&self) -> BoxFuture<'static, Result<Vec<String>, StoreError>>;

    /// Remove every record.
    fn clear(&self) -> BoxFuture<'static, Result<(), StoreError>>;
}
