use crate::StorageResult;
use async_trait::async_trait;

/// Durable string key/value capability consumed by the activation engine.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. `Ok(None)` means the key is absent.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}
