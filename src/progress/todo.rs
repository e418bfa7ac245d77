use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoCategory {
    Main,
    Side,
    #[default]
    Custom,
}

impl TodoCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoCategory::Main => "main",
            TodoCategory::Side => "side",
            TodoCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for TodoCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "main" => Ok(TodoCategory::Main),
            "side" => Ok(TodoCategory::Side),
            "custom" => Ok(TodoCategory::Custom),
            other => Err(format!("unknown todo category: {}", other)),
        }
    }
}

/// A free-form to-do. `step_id` only points at a catalog step; removing the
/// step from the catalog leaves the to-do alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub category: TodoCategory,
    #[serde(default)]
    pub step_id: Option<String>,
}

impl TodoItem {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        category: TodoCategory,
        step_id: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            completed: false,
            category,
            step_id,
        }
    }
}

/// Hands out to-do ids derived from the creation time in milliseconds.
///
/// Ids never go backwards within a session and skip any value already taken,
/// so two adds in the same millisecond still get distinct ids.
#[derive(Debug, Default)]
pub(crate) struct TodoIdGenerator {
    last: i64,
}

impl TodoIdGenerator {
    pub(crate) fn next(&mut self, now_millis: i64, taken: impl Fn(&str) -> bool) -> String {
        let mut candidate = now_millis.max(self.last.saturating_add(1));
        while taken(&candidate.to_string()) {
            candidate = candidate.saturating_add(1);
        }
        self.last = candidate;
        candidate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn same_millisecond_yields_distinct_ids() {
        let mut ids = TodoIdGenerator::default();
        let a = ids.next(1_700_000_000_000, |_| false);
        let b = ids.next(1_700_000_000_000, |_| false);
        assert_eq!(a, "1700000000000");
        assert_eq!(b, "1700000000001");
    }

    #[test]
    fn skips_taken_ids() {
        let taken: HashSet<&str> = ["500", "501"].into_iter().collect();
        let mut ids = TodoIdGenerator::default();
        assert_eq!(ids.next(500, |id| taken.contains(id)), "502");
    }

    #[test]
    fn clock_going_backwards_does_not_reuse() {
        let mut ids = TodoIdGenerator::default();
        let a = ids.next(1000, |_| false);
        let b = ids.next(10, |_| false);
        assert_eq!(a, "1000");
        assert_eq!(b, "1001");
    }

    #[test]
    fn category_wire_names() {
        let item = TodoItem::new("1", "Buy paperclips", TodoCategory::Main, Some("step3".into()));
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["category"], "main");
        assert_eq!(json["stepId"], "step3");
        assert_eq!("side".parse::<TodoCategory>(), Ok(TodoCategory::Side));
        assert!("urgent".parse::<TodoCategory>().is_err());
    }

    #[test]
    fn missing_optional_fields_default() {
        let item: TodoItem = serde_json::from_str(r#"{"id": "1", "text": "x"}"#).unwrap();
        assert!(!item.completed);
        assert_eq!(item.category, TodoCategory::Custom);
        assert!(item.step_id.is_none());
    }
}
