//! ProgressStore - sole owner and writer of the user's [`UserProgress`].
//!
//! Every mutation runs as one transaction under a single lock:
//! mutate in memory, stamp `last_updated`, persist the whole aggregate,
//! notify observers. Storage and observers see commits in the order they
//! were issued.
//!
//! ## Example
//!
//! ```ignore
//! use rvp_progress::{Catalog, FileStorage, ProgressStore, TodoCategory};
//!
//! let store = ProgressStore::builder(FileStorage::new("/home/me/.local/share/rvp"))
//!     .with_catalog(Catalog::builtin()?)
//!     .open();
//!
//! let sub = store.subscribe(|n| println!("{}: {}%", n.operation, n.progress.steps.len()))?;
//! store.toggle_step("step1")?;
//! store.add_todo("Book visa appointment", TodoCategory::Main, Some("step2"))?;
//! println!("{}% done", store.completion_percentage()?);
//! sub.unsubscribe();
//! ```

mod observers;

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, Step};
use crate::clock::{Clock, SystemClock};
use crate::codec::{self, CodecError};
use crate::error::StoreError;
use crate::progress::{
    ApplicationFormData, ProgressSummary, StepDocuments, TodoCategory, TodoIdGenerator, TodoItem,
    UserProgress,
};
use crate::storage::{ProgressStorage, StorageError};

pub use observers::{Notification, Operation, Subscription};
use observers::Observers;

/// Storage key used when none is configured.
pub const DEFAULT_STORAGE_KEY: &str = "rvp702_progress";

/// Why a commit did not reach durable storage.
#[derive(Debug, thiserror::Error)]
pub enum PersistFailure {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Encode(#[from] CodecError),
    #[error(transparent)]
    Held(WriteHold),
}

/// Why the store refuses to overwrite the persisted slot.
///
/// Set at open when the slot exists but could not be used. Commits stay in
/// memory until [`ProgressStore::reset_progress`] or
/// [`ProgressStore::import_transfer_code`] replaces the aggregate on purpose.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriteHold {
    #[error("persisted progress could not be read; writes are held")]
    Unreadable,
    #[error("persisted schema version {found} is newer than {supported}; writes are held")]
    NewerSchema { found: u64, supported: u64 },
}

/// Non-fatal: the commit is applied in memory but is not durable.
#[derive(Debug, thiserror::Error)]
#[error("progress under key {key} was not persisted: {failure}")]
pub struct PersistenceWarning {
    pub key: String,
    #[source]
    pub failure: PersistFailure,
}

/// Outcome of a mutation: the operation's value plus durability status.
#[derive(Debug)]
pub struct Commit<T = ()> {
    pub value: T,
    pub last_updated: DateTime<Utc>,
    pub warning: Option<PersistenceWarning>,
}

impl<T> Commit<T> {
    pub fn is_durable(&self) -> bool {
        self.warning.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

struct State {
    progress: UserProgress,
    todo_ids: TodoIdGenerator,
    hold: Option<WriteHold>,
}

struct Shared<S> {
    storage: S,
    key: String,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    observers: Arc<Mutex<Observers>>,
}

/// Configures and opens a [`ProgressStore`].
pub struct ProgressStoreBuilder<S> {
    storage: S,
    key: String,
    catalog: Arc<Catalog>,
    clock: Arc<dyn Clock>,
}

impl<S: ProgressStorage> ProgressStoreBuilder<S> {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_catalog(mut self, catalog: impl Into<Arc<Catalog>>) -> Self {
        self.catalog = catalog.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Load persisted progress, or start fresh when there is none. Never
    /// fails: a corrupt slot is logged, its bytes are copied to a
    /// `<key>.corrupt` slot, and a default aggregate takes its place. A slot
    /// that cannot be read, or that a newer release wrote, is left untouched
    /// and writes are held (see [`WriteHold`]).
    pub fn open(self) -> ProgressStore<S> {
        let now = self.clock.now();
        let (progress, hold) = match load(&self.storage, &self.key) {
            Load::Found(progress) => (progress, None),
            Load::Fresh => (UserProgress::new(now), None),
            Load::Held(hold) => (UserProgress::new(now), Some(hold)),
        };

        let shared = Shared {
            storage: self.storage,
            key: self.key,
            catalog: self.catalog,
            clock: self.clock,
            state: Mutex::new(State {
                progress,
                todo_ids: TodoIdGenerator::default(),
                hold,
            }),
            observers: Arc::new(Mutex::new(Observers::default())),
        };

        let store = ProgressStore {
            shared: Arc::new(shared),
        };
        if let Ok(state) = store.shared.state.lock() {
            match &state.hold {
                Some(hold) => {
                    warn!(key = %store.shared.key, %hold, "persisted progress left untouched");
                }
                None => {
                    if let Some(warning) = store.persist(&state.progress) {
                        warn!(
                            key = %warning.key,
                            error = %warning.failure,
                            "initial progress not persisted"
                        );
                    }
                }
            }
        }
        store
    }
}

enum Load {
    Found(UserProgress),
    Fresh,
    Held(WriteHold),
}

fn load<S: ProgressStorage>(storage: &S, key: &str) -> Load {
    let bytes = match storage.read(key) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            debug!(key, "no persisted progress; starting fresh");
            return Load::Fresh;
        }
        Err(e) => {
            error!(key, error = %e, "could not read persisted progress; holding writes");
            return Load::Held(WriteHold::Unreadable);
        }
    };

    match codec::decode(&bytes) {
        Ok(decoded) => {
            if let Some(from) = decoded.migrated_from {
                info!(key, from, to = codec::SCHEMA_VERSION, "migrated persisted progress");
            }
            if decoded.rekeyed_todos > 0 {
                warn!(key, count = decoded.rekeyed_todos, "re-keyed to-dos with repeated ids");
            }
            Load::Found(decoded.progress)
        }
        Err(CodecError::UnsupportedVersion { found, supported }) if found > supported => {
            error!(
                key,
                found, supported, "persisted progress is from a newer release; holding writes"
            );
            Load::Held(WriteHold::NewerSchema { found, supported })
        }
        Err(e) => {
            error!(key, error = %e, "persisted progress is corrupt; starting fresh");
            quarantine(storage, key, &bytes);
            Load::Fresh
        }
    }
}

/// Copy unreadable bytes to the first free `<key>.corrupt[.N]` slot.
fn quarantine<S: ProgressStorage>(storage: &S, key: &str, bytes: &[u8]) {
    let mut slot = format!("{}.corrupt", key);
    let mut n = 1;
    while let Ok(Some(_)) = storage.read(&slot) {
        n += 1;
        slot = format!("{}.corrupt.{}", key, n);
    }
    match storage.write(&slot, bytes) {
        Ok(()) => info!(key, quarantine = %slot, "kept corrupt progress"),
        Err(e) => warn!(key = %slot, error = %e, "could not keep corrupt progress"),
    }
}

/// The progress store. Cheap to clone; clones share one aggregate.
pub struct ProgressStore<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for ProgressStore<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: ProgressStorage> ProgressStore<S> {
    pub fn builder(storage: S) -> ProgressStoreBuilder<S> {
        ProgressStoreBuilder {
            storage,
            key: DEFAULT_STORAGE_KEY.to_string(),
            catalog: Arc::new(Catalog::empty()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Open with the default key, an empty catalog and the system clock.
    pub fn open(storage: S) -> Self {
        Self::builder(storage).open()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.shared.catalog
    }

    pub fn storage(&self) -> &S {
        &self.shared.storage
    }

    pub fn key(&self) -> &str {
        &self.shared.key
    }

    /// Set when commits are kept in memory only; see [`WriteHold`].
    pub fn write_hold(&self) -> Result<Option<WriteHold>, StoreError> {
        let state = self.lock_state("write hold")?;
        Ok(state.hold.clone())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// A copy of the latest committed aggregate.
    pub fn progress(&self) -> Result<UserProgress, StoreError> {
        self.read(|p| p.clone())
    }

    pub fn is_step_complete(&self, step_id: &str) -> Result<bool, StoreError> {
        self.read(|p| p.is_step_complete(step_id))
    }

    pub fn is_side_quest_complete(&self, quest_id: &str) -> Result<bool, StoreError> {
        self.read(|p| p.is_side_quest_complete(quest_id))
    }

    pub fn has_document(&self, document_id: &str) -> Result<bool, StoreError> {
        self.read(|p| p.has_document(document_id))
    }

    /// `round(100 * completed / catalog steps)`; 0 for an empty catalog.
    pub fn completion_percentage(&self) -> Result<u8, StoreError> {
        self.read(|p| p.completion_percentage(&self.shared.catalog))
    }

    pub fn side_quest_percentage(&self) -> Result<u8, StoreError> {
        self.read(|p| p.side_quest_percentage(&self.shared.catalog))
    }

    pub fn summary(&self) -> Result<ProgressSummary, StoreError> {
        self.read(|p| p.summary(&self.shared.catalog))
    }

    /// First catalog step not yet complete.
    pub fn next_step(&self) -> Result<Option<Step>, StoreError> {
        self.read(|p| p.next_step(&self.shared.catalog).cloned())
    }

    /// Document checklist of a catalog step; `None` for unknown steps.
    pub fn document_checklist(&self, step_id: &str) -> Result<Option<StepDocuments>, StoreError> {
        let Some(step) = self.shared.catalog.step(step_id) else {
            return Ok(None);
        };
        self.read(|p| Some(p.documents_for(step)))
    }

    pub fn todos_for_step(&self, step_id: &str) -> Result<Vec<TodoItem>, StoreError> {
        self.read(|p| p.todos_for_step(step_id).cloned().collect())
    }

    /// Portable code that [`import_transfer_code`](Self::import_transfer_code)
    /// accepts on another device.
    pub fn export_transfer_code(&self) -> Result<String, StoreError> {
        let progress = self.progress()?;
        Ok(codec::export_code(&progress)?)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Flip a step. Ids are not checked against the catalog.
    pub fn toggle_step(&self, step_id: &str) -> Result<Commit<bool>, StoreError> {
        self.commit(Operation::ToggleStep, |state, _| {
            Ok(state.progress.toggle_step(step_id))
        })
    }

    pub fn toggle_side_quest(&self, quest_id: &str) -> Result<Commit<bool>, StoreError> {
        self.commit(Operation::ToggleSideQuest, |state, _| {
            Ok(state.progress.toggle_side_quest(quest_id))
        })
    }

    pub fn toggle_document(&self, document_id: &str) -> Result<Commit<bool>, StoreError> {
        self.commit(Operation::ToggleDocument, |state, _| {
            Ok(state.progress.toggle_document(document_id))
        })
    }

    /// Append a to-do and return its id.
    pub fn add_todo(
        &self,
        text: &str,
        category: TodoCategory,
        step_id: Option<&str>,
    ) -> Result<Commit<String>, StoreError> {
        if text.trim().is_empty() {
            return Err(StoreError::EmptyTodo);
        }
        self.commit(Operation::AddTodo, |state, now| {
            let State {
                progress, todo_ids, ..
            } = state;
            let id = todo_ids.next(now.timestamp_millis(), |candidate| {
                progress.todos.iter().any(|t| t.id == candidate)
            });
            progress.todos.push(TodoItem::new(
                id.clone(),
                text,
                category,
                step_id.map(str::to_string),
            ));
            Ok(id)
        })
    }

    /// Flip a to-do. Unknown ids yield `None` but still count as a commit.
    pub fn toggle_todo(&self, todo_id: &str) -> Result<Commit<Option<bool>>, StoreError> {
        self.commit(Operation::ToggleTodo, |state, _| {
            Ok(state.progress.toggle_todo(todo_id))
        })
    }

    /// Remove a to-do. Returns whether anything was removed.
    pub fn delete_todo(&self, todo_id: &str) -> Result<Commit<bool>, StoreError> {
        self.commit(Operation::DeleteTodo, |state, _| {
            Ok(state.progress.delete_todo(todo_id))
        })
    }

    /// Shallow-merge `patch` into the form; fields absent from it are kept.
    pub fn update_form_data(&self, patch: ApplicationFormData) -> Result<Commit, StoreError> {
        self.commit(Operation::UpdateFormData, |state, _| {
            state.progress.form_data.merge(patch);
            Ok(())
        })
    }

    pub fn set_selected_location(&self, location: Option<String>) -> Result<Commit, StoreError> {
        self.commit(Operation::SelectLocation, |state, _| {
            state.progress.selected_location = location;
            Ok(())
        })
    }

    /// Discard all progress. Irreversible. Releases a [`WriteHold`].
    pub fn reset_progress(&self) -> Result<Commit, StoreError> {
        self.commit(Operation::Reset, |state, _| {
            let previous = state.progress.last_updated;
            state.progress = UserProgress::new(previous);
            info!(key = %self.shared.key, "progress reset");
            Ok(())
        })
    }

    /// Replace all progress with the contents of a transfer code. Releases
    /// a [`WriteHold`].
    pub fn import_transfer_code(&self, code: &str) -> Result<Commit, StoreError> {
        let mut imported = codec::import_code(code)?;
        self.commit(Operation::Import, |state, _| {
            imported.last_updated = imported.last_updated.max(state.progress.last_updated);
            state.progress = imported;
            Ok(())
        })
    }

    /// Register an observer. It is called right away with the current state,
    /// then after every commit, in registration order.
    ///
    /// Observers run while the store is locked and must not call back into it.
    pub fn subscribe<F>(&self, observer: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&Notification<'_>) + Send + Sync + 'static,
    {
        let state = self.lock_state("subscribe")?;
        observers::deliver(
            &observer,
            &Notification {
                operation: Operation::Subscribed,
                progress: &state.progress,
                warning: None,
            },
        );
        let mut observers = self
            .shared
            .observers
            .lock()
            .map_err(|_| StoreError::LockPoisoned("observer registration"))?;
        let id = observers.add(Box::new(observer));
        Ok(Subscription::new(id, &self.shared.observers))
    }

    pub fn observer_count(&self) -> Result<usize, StoreError> {
        let observers = self
            .shared
            .observers
            .lock()
            .map_err(|_| StoreError::LockPoisoned("observer count"))?;
        Ok(observers.len())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn lock_state(&self, operation: &'static str) -> Result<MutexGuard<'_, State>, StoreError> {
        self.shared
            .state
            .lock()
            .map_err(|_| StoreError::LockPoisoned(operation))
    }

    fn read<R>(&self, f: impl FnOnce(&UserProgress) -> R) -> Result<R, StoreError> {
        let state = self.lock_state("read")?;
        Ok(f(&state.progress))
    }

    fn commit<T>(
        &self,
        operation: Operation,
        mutate: impl FnOnce(&mut State, DateTime<Utc>) -> Result<T, StoreError>,
    ) -> Result<Commit<T>, StoreError> {
        let mut state = self.lock_state(operation.as_str())?;
        let now = self.shared.clock.now();

        let value = mutate(&mut *state, now)?;
        state.progress.touch(now);

        if matches!(operation, Operation::Reset | Operation::Import) {
            if let Some(hold) = state.hold.take() {
                info!(key = %self.shared.key, %hold, "write hold released");
            }
        }
        let warning = match &state.hold {
            Some(hold) => Some(PersistenceWarning {
                key: self.shared.key.clone(),
                failure: PersistFailure::Held(hold.clone()),
            }),
            None => self.persist(&state.progress),
        };
        if let Some(warning) = &warning {
            warn!(
                %operation,
                key = %warning.key,
                error = %warning.failure,
                "progress not persisted"
            );
        } else {
            debug!(%operation, key = %self.shared.key, "progress committed");
        }

        let observers = self
            .shared
            .observers
            .lock()
            .map_err(|_| StoreError::LockPoisoned("observer notify"))?;
        observers.notify(&Notification {
            operation,
            progress: &state.progress,
            warning: warning.as_ref(),
        });

        Ok(Commit {
            value,
            last_updated: state.progress.last_updated,
            warning,
        })
    }

    fn persist(&self, progress: &UserProgress) -> Option<PersistenceWarning> {
        let result = codec::encode(progress)
            .map_err(PersistFailure::from)
            .and_then(|bytes| {
                self.shared
                    .storage
                    .write(&self.shared.key, &bytes)
                    .map_err(PersistFailure::from)
            });
        result.err().map(|failure| PersistenceWarning {
            key: self.shared.key.clone(),
            failure,
        })
    }
}
