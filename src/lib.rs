mod catalog;
mod clock;
mod codec;
mod error;
mod progress;
mod storage;
mod store;

pub use catalog::{Catalog, CatalogError, Detail, DocumentRef, LocationTip, SideQuest, Step};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{
    decode, encode, export_code, import_code, upcast, CodecError, Decoded, SchemaUpcaster,
    PROGRESS_UPCASTERS, SCHEMA_VERSION,
};
pub use error::StoreError;
pub use progress::{
    percentage, ApplicationFormData, DocumentStatus, FormFieldError, Gender, ProgressSummary,
    StepDocuments, TodoCategory, TodoItem, UserProgress,
};
pub use storage::{FileStorage, InMemoryStorage, ProgressStorage, StorageError};
pub use store::{
    Commit, Notification, Operation, PersistFailure, PersistenceWarning, ProgressStore,
    ProgressStoreBuilder, Subscription, WriteHold, DEFAULT_STORAGE_KEY,
};
