use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, Weak};

use tracing::error;

use crate::progress::UserProgress;

use super::PersistenceWarning;

/// What produced a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Delivered once to a new observer with the current state.
    Subscribed,
    ToggleStep,
    ToggleSideQuest,
    ToggleDocument,
    AddTodo,
    ToggleTodo,
    DeleteTodo,
    UpdateFormData,
    SelectLocation,
    Reset,
    Import,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Subscribed => "subscribed",
            Operation::ToggleStep => "toggle_step",
            Operation::ToggleSideQuest => "toggle_side_quest",
            Operation::ToggleDocument => "toggle_document",
            Operation::AddTodo => "add_todo",
            Operation::ToggleTodo => "toggle_todo",
            Operation::DeleteTodo => "delete_todo",
            Operation::UpdateFormData => "update_form_data",
            Operation::SelectLocation => "select_location",
            Operation::Reset => "reset",
            Operation::Import => "import",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The committed state handed to observers.
#[derive(Debug)]
pub struct Notification<'a> {
    pub operation: Operation,
    pub progress: &'a UserProgress,
    /// Set when the commit is in memory but did not reach storage.
    pub warning: Option<&'a PersistenceWarning>,
}

type Listener = Box<dyn Fn(&Notification<'_>) + Send + Sync>;

/// Observers in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

impl Observers {
    pub(crate) fn add(&mut self, listener: Listener) -> u64 {
        self.next_id += 1;
        self.listeners.push((self.next_id, listener));
        self.next_id
    }

    pub(crate) fn remove(&mut self, id: u64) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub(crate) fn notify(&self, notification: &Notification<'_>) {
        for (_, listener) in &self.listeners {
            deliver(listener, notification);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }
}

/// Call one observer. A panicking observer is logged and skipped so it
/// cannot poison the store's locks or starve the observers after it.
pub(crate) fn deliver<F>(listener: &F, notification: &Notification<'_>)
where
    F: Fn(&Notification<'_>) + ?Sized,
{
    if panic::catch_unwind(AssertUnwindSafe(|| listener(notification))).is_err() {
        error!(operation = %notification.operation, "progress observer panicked");
    }
}

/// Handle returned by [`ProgressStore::subscribe`](super::ProgressStore::subscribe).
///
/// Dropping the handle keeps the observer registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to stop notifications.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<Observers>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, observers: &Arc<Mutex<Observers>>) -> Self {
        Self {
            id,
            observers: Arc::downgrade(observers),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stop notifications. Returns false if the store is gone or the
    /// observer was already removed.
    pub fn unsubscribe(self) -> bool {
        let Some(observers) = self.observers.upgrade() else {
            return false;
        };
        let removed = match observers.lock() {
            Ok(mut observers) => observers.remove(self.id),
            Err(_) => false,
        };
        removed
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
