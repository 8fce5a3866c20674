use serde_json::Value;
use uuid::Uuid;

use crate::errors::LoadError;

/// Bring a raw document file from `from_version` up to `to_version`.
///
/// Steps run one version at a time on the untyped JSON, before the
/// document is deserialized.
pub fn migrate(mut doc: Value, from_version: u32, to_version: u32) -> Result<Value, LoadError> {
    let mut version = from_version;
    while version < to_version {
        doc = match version {
            0 => v0_to_v1(doc).map_err(|reason| LoadError::MigrationFailed {
                from: version,
                to: version + 1,
                reason,
            })?,
            _ => {
                return Err(LoadError::MigrationFailed {
                    from: version,
                    to: to_version,
                    reason: format!("no migration path from v{version}"),
                })
            }
        };
        version += 1;
    }
    Ok(doc)
}

/// Version 0 documents stored no feature identifiers; each feature gets a fresh one.
fn v0_to_v1(mut doc: Value) -> Result<Value, String> {
    let features = doc
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or("document has no feature list")?;
    for feature in features {
        let f = feature.as_object_mut().ok_or("feature is not an object")?;
        f.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    }
    Ok(doc)
}
