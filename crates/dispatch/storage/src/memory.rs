//! In-memory reference implementation of the key/value contract.
//!
//! This adapter is deterministic and test-friendly. Production deployments
//! should use a networked backend (e.g. PostgreSQL) so backlogs survive
//! process restarts.

use crate::traits::KeyValueStore;
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory key/value adapter.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        validate_key(key)?;
        let guard = self
            .entries
            .read()
            .map_err(|_| StorageError::Backend("entries lock poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        validate_key(key)?;
        let mut guard = self
            .entries
            .write()
            .map_err(|_| StorageError::Backend("entries lock poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let mut guard = self
            .entries
            .write()
            .map_err(|_| StorageError::Backend("entries lock poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}
