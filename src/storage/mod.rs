//! Storage - the durable key/value slot that holds persisted progress.
//!
//! The store owns exactly one key; nothing else writes to it. Backends only
//! move bytes, encoding lives in [`codec`](crate::codec).

mod file;
mod in_memory;

use std::sync::Arc;

pub use file::FileStorage;
pub use in_memory::InMemoryStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error for key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Byte-level persistence for the progress slot. One value per key (latest wins).
pub trait ProgressStorage: Send + Sync {
    /// Load the bytes stored under `key`, if any.
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Save (or overwrite) the bytes stored under `key`.
    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Delete the value under `key`. Returns true if one existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

impl<S: ProgressStorage + ?Sized> ProgressStorage for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(key, bytes)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key)
    }
}

impl<S: ProgressStorage + ?Sized> ProgressStorage for Box<S> {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).write(key, bytes)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        (**self).remove(key)
    }
}
