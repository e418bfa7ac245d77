use serde_json::{Map, Value};

/// A pure transformation that moves a persisted progress document one
/// schema version forward.
///
/// Upcasters are plain structs with function pointers, returned as a static
/// slice. They operate on the untyped JSON object so old layouts never need
/// a Rust type of their own.
pub struct SchemaUpcaster {
    pub from_version: u64,
    pub to_version: u64,
    pub transform: fn(Map<String, Value>) -> Map<String, Value>,
}

/// Upcasters for the progress document, oldest first.
pub const PROGRESS_UPCASTERS: &[SchemaUpcaster] = &[SchemaUpcaster {
    from_version: 1,
    to_version: 2,
    transform: v1_to_v2,
}];

/// Apply upcasters until none matches. Chains automatically (v1->v2->v3).
pub fn upcast(
    mut doc: Map<String, Value>,
    mut version: u64,
    upcasters: &[SchemaUpcaster],
) -> (Map<String, Value>, u64) {
    loop {
        let Some(u) = upcasters.iter().find(|u| u.from_version == version) else {
            break;
        };
        doc = (u.transform)(doc);
        version = u.to_version;
    }
    (doc, version)
}

/// v1 had no global document map.
fn v1_to_v2(mut doc: Map<String, Value>) -> Map<String, Value> {
    doc.entry("documents")
        .or_insert_with(|| Value::Object(Map::new()));
    doc
}
