#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rvp_progress::{
    Catalog, InMemoryStorage, ManualClock, ProgressStorage, ProgressStore, SideQuest, Step,
    StorageError,
};

pub const T0: i64 = 1_700_000_000;

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.timestamp_opt(T0, 0).unwrap()))
}

/// Catalog with `step1..=stepN` and the given side quest ids.
pub fn numbered_catalog(steps: usize, quests: &[&str]) -> Catalog {
    let steps: Vec<Step> = (1..=steps)
        .map(|i| {
            serde_json::from_value(serde_json::json!({
                "id": format!("step{}", i),
                "title": format!("{}. Step", i),
            }))
            .unwrap()
        })
        .collect();
    let quests: Vec<SideQuest> = quests
        .iter()
        .map(|id| {
            serde_json::from_value(serde_json::json!({"id": id, "title": id})).unwrap()
        })
        .collect();
    Catalog::new(steps, quests).unwrap()
}

pub fn open_store<S: ProgressStorage>(
    storage: S,
    clock: &Arc<ManualClock>,
    catalog: Catalog,
) -> ProgressStore<S> {
    ProgressStore::builder(storage)
        .with_clock(clock.clone())
        .with_catalog(catalog)
        .open()
}

/// In-memory storage whose reads or writes can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyStorage {
    inner: InMemoryStorage,
    failing: Arc<AtomicBool>,
    failing_reads: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl FlakyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_reads(&self, failing: bool) {
        self.failing_reads.store(failing, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryStorage {
        &self.inner
    }
}

impl ProgressStorage for FlakyStorage {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "device busy"),
            });
        }
        self.inner.read(key)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("quota exceeded".into()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, bytes)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.remove(key)
    }
}
