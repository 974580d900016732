use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("backend error: {0}")]
    Backend(String),
}
