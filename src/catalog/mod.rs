//! Catalog - the read-only step and side-quest definitions.
//!
//! The catalog is loaded once and shared by reference. Its ids are the join
//! keys of [`UserProgress`](crate::UserProgress); the store never mutates it.
//!
//! ## Example
//!
//! ```ignore
//! use rvp_progress::Catalog;
//!
//! let catalog = Catalog::builtin()?;
//! let first = &catalog.steps()[0];
//! println!("{}: {} documents", first.title, first.documents().count());
//! ```

mod side_quest;
mod step;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use side_quest::SideQuest;
pub use step::{Detail, DocumentRef, LocationTip, Step};

const BUILTIN_CATALOG: &str = include_str!("../../data/catalog.json");

/// Error type for catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate {kind} id in catalog: {id}")]
    DuplicateId { kind: &'static str, id: String },
}

/// Ordered steps and side quests of the residence-permit workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    steps: Vec<Step>,
    #[serde(default)]
    side_quests: Vec<SideQuest>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate step or side-quest ids.
    pub fn new(steps: Vec<Step>, side_quests: Vec<SideQuest>) -> Result<Self, CatalogError> {
        ensure_unique("step", steps.iter().map(|s| s.id.as_str()))?;
        ensure_unique("side quest", side_quests.iter().map(|q| q.id.as_str()))?;
        Ok(Self { steps, side_quests })
    }

    /// A catalog with no steps. Completion against it is always 0%.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: Catalog = serde_json::from_str(json)?;
        Self::new(raw.steps, raw.side_quests)
    }

    /// The RVP catalog shipped with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn side_quests(&self) -> &[SideQuest] {
        &self.side_quests
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn side_quest(&self, id: &str) -> Option<&SideQuest> {
        self.side_quests.iter().find(|q| q.id == id)
    }

    /// Distinct documents across all steps, in order of first appearance.
    pub fn documents(&self) -> Vec<&DocumentRef> {
        let mut seen = HashSet::new();
        let mut documents = Vec::new();
        for doc in self.steps.iter().flat_map(|s| s.documents()) {
            if seen.insert(doc.id.as_str()) {
                documents.push(doc);
            }
        }
        documents
    }

    /// Distinct locations that have tips, in order of first appearance.
    pub fn locations(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.steps
            .iter()
            .flat_map(|s| s.location_tips.iter())
            .map(|group| group.location.as_str())
            .filter(|location| seen.insert(*location))
            .collect()
    }
}

fn ensure_unique<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_loads() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.steps().len(), 18);
        assert_eq!(catalog.side_quests().len(), 4);
        assert_eq!(catalog.steps()[0].id, "step1");
        assert!(catalog.step("step5_1").is_some());
        assert!(catalog.side_quest("snils").is_some());
    }

    #[test]
    fn builtin_documents_are_deduplicated() {
        let catalog = Catalog::builtin().unwrap();
        let docs = catalog.documents();
        let passports = docs.iter().filter(|d| d.id == "passport_original").count();
        assert_eq!(passports, 1);
        assert_eq!(docs[0].id, "criminal_record");
    }

    #[test]
    fn builtin_locations_include_france() {
        let catalog = Catalog::builtin().unwrap();
        assert!(catalog.locations().contains(&"France"));
    }

    #[test]
    fn duplicate_step_id_is_rejected() {
        let err = Catalog::from_json(
            r#"{"steps": [
                {"id": "step1", "title": "a"},
                {"id": "step1", "title": "b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateId { kind: "step", .. }));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Catalog::from_json("{\"steps\": [").unwrap_err(),
            CatalogError::Json(_)
        ));
    }

    #[test]
    fn empty_catalog_has_nothing() {
        let catalog = Catalog::empty();
        assert!(catalog.steps().is_empty());
        assert!(catalog.documents().is_empty());
    }
}
