//! Codec - the persisted and portable representations of [`UserProgress`].
//!
//! The durable format is a JSON object with the aggregate's camelCase fields
//! plus a `schemaVersion` number. Documents written before versioning have no
//! such field and are read as version 1; upcasters lift them to the current
//! shape before typed decoding.

mod transfer;
mod upcaster;

use serde_json::Value;

use crate::progress::UserProgress;

pub use transfer::{export_code, import_code};
pub use upcaster::{upcast, SchemaUpcaster, PROGRESS_UPCASTERS};

/// Version written by [`encode`].
pub const SCHEMA_VERSION: u64 = 2;

const VERSION_FIELD: &str = "schemaVersion";
const UNVERSIONED: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("progress json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("persisted progress is not a JSON object")]
    NotAnObject,
    #[error("invalid schema version field: {0}")]
    InvalidVersion(Value),
    #[error("unsupported schema version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u64, supported: u64 },
    #[error("transfer code is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("transfer code payload is malformed: {0}")]
    Bitcode(#[from] bitcode::Error),
    #[error("to-do id {0} is used more than once")]
    DuplicateTodoId(String),
}

impl CodecError {
    /// The document was written by a newer release of this crate.
    pub fn is_newer_schema(&self) -> bool {
        matches!(self, CodecError::UnsupportedVersion { found, supported } if found > supported)
    }
}

/// Result of [`decode`]: the aggregate and, when an upcast happened, the
/// version it started from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub progress: UserProgress,
    pub migrated_from: Option<u64>,
    /// To-dos that shared an id with an earlier item and got a new one.
    pub rekeyed_todos: usize,
}

pub fn encode(progress: &UserProgress) -> Result<Vec<u8>, CodecError> {
    let Value::Object(mut doc) = serde_json::to_value(progress)? else {
        return Err(CodecError::NotAnObject);
    };
    doc.insert(VERSION_FIELD.to_string(), Value::from(SCHEMA_VERSION));
    Ok(serde_json::to_vec(&doc)?)
}

pub fn decode(bytes: &[u8]) -> Result<Decoded, CodecError> {
    let Value::Object(mut doc) = serde_json::from_slice::<Value>(bytes)? else {
        return Err(CodecError::NotAnObject);
    };

    let version = match doc.remove(VERSION_FIELD) {
        None => UNVERSIONED,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| CodecError::InvalidVersion(value.clone()))?,
    };
    if version > SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    let (doc, reached) = upcast(doc, version, PROGRESS_UPCASTERS);
    if reached != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: version,
            supported: SCHEMA_VERSION,
        });
    }

    let mut progress: UserProgress = serde_json::from_value(Value::Object(doc))?;
    let rekeyed_todos = progress.rekey_duplicate_todos();
    Ok(Decoded {
        progress,
        migrated_from: (version != SCHEMA_VERSION).then_some(version),
        rekeyed_todos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{Gender, TodoCategory, TodoItem};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn sample() -> UserProgress {
        let mut progress = UserProgress::new(Utc.timestamp_millis_opt(1_700_000_123_456).unwrap());
        progress.steps.insert("step1".into(), true);
        progress.steps.insert("step2".into(), false);
        progress.steps.insert("legacy_step".into(), true);
        progress.side_quests.insert("sim".into(), true);
        progress.documents.insert("criminal_record".into(), true);
        progress.todos.push(TodoItem::new(
            "1700000123456",
            "Book visa appointment",
            TodoCategory::Main,
            Some("step2".into()),
        ));
        progress.form_data.last_name = Some("Martin".into());
        progress.form_data.middle_name = Some(String::new());
        progress.form_data.gender = Some(Gender::Female);
        progress.selected_location = Some("France".into());
        progress
    }

    #[test]
    fn roundtrip_is_identity() {
        let progress = sample();
        let decoded = decode(&encode(&progress).unwrap()).unwrap();
        assert_eq!(decoded.progress, progress);
        assert_eq!(decoded.migrated_from, None);
        assert_eq!(decoded.rekeyed_todos, 0);
    }

    #[test]
    fn encoded_document_uses_wire_names() {
        let bytes = encode(&sample()).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["schemaVersion"], json!(2));
        assert_eq!(doc["sideQuests"], json!({"sim": true}));
        assert_eq!(doc["formData"]["lastName"], json!("Martin"));
        assert_eq!(doc["todos"][0]["stepId"], json!("step2"));
        assert_eq!(doc["selectedLocation"], json!("France"));
        assert!(doc["lastUpdated"].is_string());
    }

    #[test]
    fn unversioned_document_is_migrated() {
        let legacy = json!({
            "steps": {"step1": true},
            "sideQuests": {},
            "todos": [{"id": "1", "text": "x", "completed": false, "category": "custom"}],
            "formData": {"firstName": "Jean"},
            "lastUpdated": "2024-05-01T10:00:00.000Z"
        });
        let decoded = decode(legacy.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.migrated_from, Some(1));
        assert!(decoded.progress.documents.is_empty());
        assert!(decoded.progress.is_step_complete("step1"));
        assert_eq!(decoded.progress.form_data.first_name.as_deref(), Some("Jean"));
    }

    #[test]
    fn corrupt_bytes_are_errors() {
        assert!(matches!(decode(b"{\"steps\": {"), Err(CodecError::Json(_))));
        assert!(matches!(decode(b"[1, 2]"), Err(CodecError::NotAnObject)));
        assert!(matches!(
            decode(br#"{"schemaVersion": "two"}"#),
            Err(CodecError::InvalidVersion(_))
        ));
        assert!(matches!(
            decode(br#"{"steps": {"step1": "yes"}, "schemaVersion": 2}"#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn newer_schema_is_refused() {
        let err = decode(br#"{"schemaVersion": 7}"#).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedVersion { found: 7, supported: 2 }));
        assert!(err.is_newer_schema());
        assert!(!decode(br#"{"schemaVersion": 0}"#).unwrap_err().is_newer_schema());
    }

    #[test]
    fn repeated_todo_ids_get_fresh_ones() {
        let doc = json!({
            "steps": {"step1": true},
            "todos": [
                {"id": "1", "text": "a"},
                {"id": "1", "text": "b"}
            ],
            "lastUpdated": "2024-05-01T10:00:00Z",
            "schemaVersion": 2
        });
        let decoded = decode(doc.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.rekeyed_todos, 1);
        assert_eq!(decoded.progress.todos.len(), 2);
        assert_eq!(decoded.progress.duplicate_todo_id(), None);
        assert_eq!(decoded.progress.todos[0].id, "1");
        assert!(decoded.progress.is_step_complete("step1"));
    }

    #[test]
    fn cleared_gender_decodes() {
        let doc = json!({
            "steps": {"step1": true, "step2": true},
            "formData": {"lastName": "Dupont", "gender": ""},
            "schemaVersion": 2
        });
        let decoded = decode(doc.to_string().as_bytes()).unwrap();
        assert_eq!(decoded.progress.form_data.gender, Some(Gender::Unset));
        assert!(decoded.progress.is_step_complete("step2"));
    }
}
