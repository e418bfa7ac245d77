use serde::{Deserialize, Serialize};

/// Errand that runs alongside the main steps (SIM card, bank account, SNILS).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideQuest {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Plain instructions, in order.
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub optional: bool,
}
