use serde::{Deserialize, Serialize};

/// A document a step asks for or hands out, keyed by a stable document id.
///
/// The same id may appear in several steps: a passport is given at one
/// desk and returned at the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub name: String,
}

/// One line of a step's instructions, optionally paired with a tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Detail {
    Text(String),
    Tipped {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tip: Option<String>,
    },
}

impl Detail {
    pub fn text(&self) -> &str {
        match self {
            Detail::Text(text) | Detail::Tipped { text, .. } => text,
        }
    }

    pub fn tip(&self) -> Option<&str> {
        match self {
            Detail::Text(_) => None,
            Detail::Tipped { tip, .. } => tip.as_deref(),
        }
    }
}

/// Tips that only apply to one city or home country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationTip {
    pub location: String,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// A mandatory procedural step of the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawStep")]
pub struct Step {
    pub id: String,
    pub title: String,
    pub description: String,
    pub details: Vec<Detail>,
    pub documents_to_give: Vec<DocumentRef>,
    pub documents_to_receive: Vec<DocumentRef>,
    pub location_tips: Vec<LocationTip>,
}

impl Step {
    /// Tips for `location`, matched case-insensitively.
    pub fn tips_for(&self, location: &str) -> Option<&[String]> {
        self.location_tips
            .iter()
            .find(|group| group.location.eq_ignore_ascii_case(location))
            .map(|group| group.tips.as_slice())
    }

    /// Every document this step touches, given first, then received.
    pub fn documents(&self) -> impl Iterator<Item = &DocumentRef> {
        self.documents_to_give
            .iter()
            .chain(self.documents_to_receive.iter())
    }
}

/// Wire shape accepted for a step. Covers both the structured layout and the
/// older flat one that only had `documents` and `tips` string lists.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStep {
    id: String,
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    details: Vec<Detail>,
    #[serde(default)]
    documents_to_give: Vec<DocumentRef>,
    #[serde(default)]
    documents_to_receive: Vec<DocumentRef>,
    #[serde(default)]
    location_tips: Vec<LocationTip>,
    #[serde(default)]
    documents: Vec<String>,
    #[serde(default)]
    tips: Vec<String>,
}

impl From<RawStep> for Step {
    fn from(raw: RawStep) -> Self {
        let mut details = raw.details;
        details.extend(raw.tips.into_iter().map(Detail::Text));

        let mut documents_to_give = raw.documents_to_give;
        documents_to_give.extend(raw.documents.into_iter().map(|name| DocumentRef {
            id: slug(&name),
            name,
        }));

        Step {
            id: raw.id,
            title: raw.title,
            description: raw.description,
            details,
            documents_to_give,
            documents_to_receive: raw.documents_to_receive,
            location_tips: raw.location_tips,
        }
    }
}

/// Lowercase ASCII slug used as the document id of a legacy flat entry.
fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('_') {
            out.push('_');
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
