use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{CodecError, SCHEMA_VERSION};
use crate::progress::UserProgress;

#[derive(Serialize, Deserialize)]
struct TransferEnvelope<P> {
    schema_version: u64,
    progress: P,
}

/// Encode progress as a compact, URL-safe code for moving it to another
/// device. The payload is bitcode, so it is only readable by the same
/// schema version.
pub fn export_code(progress: &UserProgress) -> Result<String, CodecError> {
    let envelope = TransferEnvelope {
        schema_version: SCHEMA_VERSION,
        progress,
    };
    let bytes = bitcode::serialize(&envelope)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn import_code(code: &str) -> Result<UserProgress, CodecError> {
    let bytes = URL_SAFE_NO_PAD.decode(code.trim())?;
    let envelope: TransferEnvelope<UserProgress> = bitcode::deserialize(&bytes)?;
    if envelope.schema_version != SCHEMA_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    if let Some(id) = envelope.progress.duplicate_todo_id() {
        return Err(CodecError::DuplicateTodoId(id.to_string()));
    }
    Ok(envelope.progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{TodoCategory, TodoItem};
    use chrono::{TimeZone, Utc};

    #[test]
    fn code_carries_full_state() {
        let mut progress = UserProgress::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        progress.steps.insert("step1".into(), true);
        progress.documents.insert("migration_card".into(), true);
        progress.todos.push(TodoItem::new(
            "1700000000000",
            "Photocopy migration card",
            TodoCategory::Main,
            Some("step3".into()),
        ));
        progress.form_data.last_name = Some("Martin".into());
        progress.selected_location = Some("France".into());

        let code = export_code(&progress).unwrap();
        assert!(code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(import_code(&code).unwrap(), progress);
    }

    #[test]
    fn garbage_code_is_rejected() {
        assert!(matches!(
            import_code("not base64 at all!"),
            Err(CodecError::Base64(_))
        ));
        assert!(import_code("AAAA").is_err());
    }

    #[test]
    fn other_schema_version_is_rejected() {
        let progress = UserProgress::new(Utc.timestamp_opt(0, 0).unwrap());
        let envelope = TransferEnvelope {
            schema_version: 99,
            progress: &progress,
        };
        let code = URL_SAFE_NO_PAD.encode(bitcode::serialize(&envelope).unwrap());
        assert!(matches!(
            import_code(&code),
            Err(CodecError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn repeated_todo_ids_are_rejected() {
        let mut progress = UserProgress::new(Utc.timestamp_opt(0, 0).unwrap());
        for text in ["first", "second"] {
            progress
                .todos
                .push(TodoItem::new("1", text, TodoCategory::Custom, None));
        }
        let code = export_code(&progress).unwrap();
        assert!(matches!(
            import_code(&code),
            Err(CodecError::DuplicateTodoId(id)) if id == "1"
        ));
    }
}
