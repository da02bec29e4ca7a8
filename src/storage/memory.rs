use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{KeyValueStore, StoreError, WriteBatch, WriteOp};

/// Process-local store, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push the total stored bytes past `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> u64 {
        total_bytes(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panic while holding the lock can't leave the map half-written:
        // batches are staged on a copy and swapped in whole.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn total_bytes(entries: &BTreeMap<String, Vec<u8>>) -> u64 {
    entries.values().map(|v| v.len() as u64).sum()
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.commit(batch).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut entries = self.lock();
        let mut staged = entries.clone();

        for op in batch.into_ops() {
            match op {
                WriteOp::Put { key, value } => {
                    staged.insert(key, value);
                }
                WriteOp::Remove { key } => {
                    staged.remove(&key);
                }
            }
        }

        if let Some(quota) = self.quota_bytes {
            let needed = total_bytes(&staged);
            if needed > quota {
                return Err(StoreError::Full { needed, quota });
            }
        }

        *entries = staged;
        Ok(())
    }
}
