use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ProgressStorage, StorageError};

/// In-memory storage backed by `Arc<RwLock<HashMap>>`.
///
/// Clone-friendly (cloning shares the same underlying storage), which lets
/// tests reopen a store against the bytes a previous one wrote.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    slots: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with one slot.
    pub fn with_slot(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        if let Ok(mut slots) = storage.slots.write() {
            slots.insert(key.to_string(), bytes.into());
        }
        storage
    }
}

impl ProgressStorage for InMemoryStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| StorageError::LockPoisoned("slot read"))?;
        Ok(slots.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| StorageError::LockPoisoned("slot write"))?;
        slots.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut slots = self
            .slots
            .write()
            .map_err(|_| StorageError::LockPoisoned("slot write"))?;
        Ok(slots.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read() {
        let storage = InMemoryStorage::new();
        storage.write("rvp702_progress", b"{}").unwrap();
        assert_eq!(
            storage.read("rvp702_progress").unwrap(),
            Some(b"{}".to_vec())
        );
    }

    #[test]
    fn read_missing_returns_none() {
        let storage = InMemoryStorage::new();
        assert!(storage.read("missing").unwrap().is_none());
    }

    #[test]
    fn write_overwrites() {
        let storage = InMemoryStorage::with_slot("k", "old");
        storage.write("k", b"new").unwrap();
        assert_eq!(storage.read("k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn remove_existing_and_missing() {
        let storage = InMemoryStorage::with_slot("k", "v");
        assert!(storage.remove("k").unwrap());
        assert!(!storage.remove("k").unwrap());
        assert!(storage.read("k").unwrap().is_none());
    }

    #[test]
    fn clone_shares_storage() {
        let storage = InMemoryStorage::new();
        let clone = storage.clone();
        storage.write("k", b"shared").unwrap();
        assert_eq!(clone.read("k").unwrap(), Some(b"shared".to_vec()));
    }
}
