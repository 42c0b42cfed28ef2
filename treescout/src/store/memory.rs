//! In-memory record store.

use std::sync::Arc;

use dashmap::DashMap;

use super::{BoxFuture, RecordStore, StoreError};

/// Record store keeping everything in process memory.
///
/// Used for tests and for sessions that opt out of persistence. Cloning
/// shares the underlying map, so two handles over the same `MemoryStore`
/// see each other's writes (the same-physical-store contract the remote
/// cache view relies on).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, Result<Option<Vec<u8>>, StoreError>> {
        let records = Arc::clone(&self.records);
        let key = key.to_string();
        Box::pin(async move { Ok(records.get(&key).map(|r| r.value().clone())) })
    }

    fn put(&self, key: &str, value: Vec<u8>) -> BoxFuture<'static, Result<(), StoreError>> {
        let records = Arc::clone(&self.records);
        let key = key.to_string();
        Box::pin(async move {
            records.insert(key, value);
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, Result<bool, StoreError>> {
        let records = Arc::clone(&self.records);
        let key = key.to_string();
        Box::pin(async move { Ok(records.remove(&key).is_some()) })
    }

    fn keys(&self) -> BoxFuture<'static, Result<Vec<String>, StoreError>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move { Ok(records.iter().map(|r| r.key().clone()).collect()) })
    }

    fn clear(&self) -> BoxFuture<'static, Result<(), StoreError>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move {
            records.clear();
            Ok(())
        })
    }
}
