use crate::codec::CodecError;

/// Errors returned by [`ProgressStore`](crate::ProgressStore) operations.
///
/// Persistence failures are not errors; they ride along on the
/// [`Commit`](crate::Commit) as a [`PersistenceWarning`](crate::PersistenceWarning).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("progress store lock poisoned during {0}")]
    LockPoisoned(&'static str),
    #[error("todo text must not be empty")]
    EmptyTodo,
    #[error(transparent)]
    Codec(#[from] CodecError),
}
