//! UserProgress - the single mutable aggregate of a user's checklist.
//!
//! Completion maps are sparse: a missing key reads as `false`. Keys that the
//! current catalog does not know are kept as-is so older or newer catalogs
//! can share the same persisted state.

mod form;
mod todo;

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, DocumentRef, Step};

pub use form::{ApplicationFormData, FormFieldError, Gender};
pub use todo::{TodoCategory, TodoItem};
pub(crate) use todo::TodoIdGenerator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    #[serde(default)]
    pub steps: BTreeMap<String, bool>,
    #[serde(default)]
    pub side_quests: BTreeMap<String, bool>,
    /// Global possession state of a document, whichever step produced it.
    #[serde(default)]
    pub documents: BTreeMap<String, bool>,
    #[serde(default)]
    pub todos: Vec<TodoItem>,
    #[serde(default)]
    pub form_data: ApplicationFormData,
    #[serde(default)]
    pub selected_location: Option<String>,
    #[serde(default)]
    pub last_updated: DateTime<Utc>,
}

impl UserProgress {
    /// Fresh state: nothing done, no to-dos, empty form.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            steps: BTreeMap::new(),
            side_quests: BTreeMap::new(),
            documents: BTreeMap::new(),
            todos: Vec::new(),
            form_data: ApplicationFormData::default(),
            selected_location: None,
            last_updated: now,
        }
    }

    pub fn is_step_complete(&self, step_id: &str) -> bool {
        flag(&self.steps, step_id)
    }

    pub fn is_side_quest_complete(&self, quest_id: &str) -> bool {
        flag(&self.side_quests, quest_id)
    }

    pub fn has_document(&self, document_id: &str) -> bool {
        flag(&self.documents, document_id)
    }

    pub fn todo(&self, todo_id: &str) -> Option<&TodoItem> {
        self.todos.iter().find(|t| t.id == todo_id)
    }

    pub fn todos_for_step<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a TodoItem> {
        self.todos
            .iter()
            .filter(move |t| t.step_id.as_deref() == Some(step_id))
    }

    /// Share of catalog steps marked complete, rounded to the nearest percent.
    ///
    /// Only catalog ids count; stray keys in `steps` are ignored. An empty
    /// catalog yields 0.
    pub fn completion_percentage(&self, catalog: &Catalog) -> u8 {
        let done = catalog
            .steps()
            .iter()
            .filter(|s| self.is_step_complete(&s.id))
            .count();
        percentage(done, catalog.steps().len())
    }

    pub fn side_quest_percentage(&self, catalog: &Catalog) -> u8 {
        let done = catalog
            .side_quests()
            .iter()
            .filter(|q| self.is_side_quest_complete(&q.id))
            .count();
        percentage(done, catalog.side_quests().len())
    }

    /// First catalog step not yet marked complete.
    pub fn next_step<'c>(&self, catalog: &'c Catalog) -> Option<&'c Step> {
        catalog.steps().iter().find(|s| !self.is_step_complete(&s.id))
    }

    /// Documents of `step` paired with whether the user holds them.
    pub fn documents_for(&self, step: &Step) -> StepDocuments {
        let status = |docs: &[DocumentRef]| -> Vec<DocumentStatus> {
            docs.iter()
                .map(|doc| DocumentStatus {
                    document: doc.clone(),
                    held: self.has_document(&doc.id),
                })
                .collect()
        };
        StepDocuments {
            step_id: step.id.clone(),
            to_give: status(&step.documents_to_give),
            to_receive: status(&step.documents_to_receive),
        }
    }

    pub fn summary(&self, catalog: &Catalog) -> ProgressSummary {
        let steps_done = catalog
            .steps()
            .iter()
            .filter(|s| self.is_step_complete(&s.id))
            .count();
        let side_quests_done = catalog
            .side_quests()
            .iter()
            .filter(|q| self.is_side_quest_complete(&q.id))
            .count();
        let todos_done = self.todos.iter().filter(|t| t.completed).count();

        ProgressSummary {
            steps_done,
            steps_total: catalog.steps().len(),
            side_quests_done,
            side_quests_total: catalog.side_quests().len(),
            todos_done,
            todos_open: self.todos.len() - todos_done,
            documents_held: self.documents.values().filter(|held| **held).count(),
            percentage: percentage(steps_done, catalog.steps().len()),
        }
    }

    /// First to-do id held by more than one item.
    pub fn duplicate_todo_id(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.todos
            .iter()
            .map(|t| t.id.as_str())
            .find(|id| !seen.insert(*id))
    }

    /// Give each repeated to-do id a fresh one. The first holder keeps its
    /// id. Returns how many items were re-keyed.
    pub(crate) fn rekey_duplicate_todos(&mut self) -> usize {
        let existing: HashSet<String> = self.todos.iter().map(|t| t.id.clone()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut ids = TodoIdGenerator::default();
        let base = self.last_updated.timestamp_millis();
        let mut rekeyed = 0;

        for todo in &mut self.todos {
            if seen.insert(todo.id.clone()) {
                continue;
            }
            let id = ids.next(base, |candidate| {
                existing.contains(candidate) || seen.contains(candidate)
            });
            seen.insert(id.clone());
            todo.id = id;
            rekeyed += 1;
        }
        rekeyed
    }

    /// Advance `last_updated` to `now`, never backwards.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    pub(crate) fn toggle_step(&mut self, step_id: &str) -> bool {
        toggle(&mut self.steps, step_id)
    }

    pub(crate) fn toggle_side_quest(&mut self, quest_id: &str) -> bool {
        toggle(&mut self.side_quests, quest_id)
    }

    pub(crate) fn toggle_document(&mut self, document_id: &str) -> bool {
        toggle(&mut self.documents, document_id)
    }

    pub(crate) fn toggle_todo(&mut self, todo_id: &str) -> Option<bool> {
        let todo = self.todos.iter_mut().find(|t| t.id == todo_id)?;
        todo.completed = !todo.completed;
        Some(todo.completed)
    }

    pub(crate) fn delete_todo(&mut self, todo_id: &str) -> bool {
        let before = self.todos.len();
        self.todos.retain(|t| t.id != todo_id);
        self.todos.len() != before
    }
}

/// Counts shown on the overview screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSummary {
    pub steps_done: usize,
    pub steps_total: usize,
    pub side_quests_done: usize,
    pub side_quests_total: usize,
    pub todos_done: usize,
    pub todos_open: usize,
    pub documents_held: usize,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentStatus {
    pub document: DocumentRef,
    pub held: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDocuments {
    pub step_id: String,
    pub to_give: Vec<DocumentStatus>,
    pub to_receive: Vec<DocumentStatus>,
}

impl StepDocuments {
    /// Documents still missing before the step can be attempted.
    pub fn missing(&self) -> impl Iterator<Item = &DocumentRef> {
        self.to_give
            .iter()
            .filter(|status| !status.held)
            .map(|status| &status.document)
    }
}

fn flag(map: &BTreeMap<String, bool>, id: &str) -> bool {
    map.get(id).copied().unwrap_or(false)
}

fn toggle(map: &mut BTreeMap<String, bool>, id: &str) -> bool {
    let value = !flag(map, id);
    map.insert(id.to_string(), value);
    value
}

/// `round(100 * done / total)` with half rounding up; 0 when `total` is 0.
pub fn percentage(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = done.min(total);
    ((200 * done + total) / (2 * total)) as u8
}
