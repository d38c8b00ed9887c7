//! Reading, validating and writing the two source documents.
//!
//! Documents are read whole into a [`serde_json::Value`], checked for the
//! expected structure, then parsed into typed records ([`overlay`],
//! [`reputations`]). Writes replace the target atomically: the new content
//! goes to a temporary file in the same directory which is then renamed over
//! the original.

pub mod key;
pub mod overlay;
pub mod reputations;
pub mod table;

pub use key::DriverKey;
pub use overlay::{DriverTag, OverlaySettings, TagCategory};
pub use reputations::{ReputationRecord, Reputations};
pub use table::{CsvImport, MergePlan};

use crate::error::SyncError;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Reads and parses a JSON document.
///
/// # Errors
///
/// - [`SyncError::NotFound`] if `path` does not exist
/// - [`SyncError::Io`] if it cannot be read
/// - [`SyncError::Parse`] if it is not valid JSON
pub fn read_json(path: &Path) -> Result<Value, SyncError> {
    if !path.exists() {
        return Err(SyncError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read(path).map_err(|e| SyncError::io(path, e))?;
    let value = serde_json::from_slice(&content).map_err(|source| SyncError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = content.len(), "Read JSON document");
    Ok(value)
}

/// Serializes `value` with 4-space indentation.
///
/// # Errors
///
/// Returns the serializer error.
pub fn to_pretty_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    Ok(out)
}

/// Atomically writes a JSON document. `None` writes an empty array.
///
/// The parent directory must exist.
///
/// # Errors
///
/// - [`SyncError::Encode`] if serialization fails
/// - [`SyncError::Io`] if the temporary file cannot be written or renamed
pub fn write_json(path: &Path, value: Option<&Value>) -> Result<(), SyncError> {
    let empty = Value::Array(Vec::new());
    let bytes = to_pretty_bytes(value.unwrap_or(&empty)).map_err(|source| SyncError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "Wrote JSON document");
    Ok(())
}

/// Replaces `path` with `bytes` through a temporary file in the same directory.
///
/// # Errors
///
/// Returns [`SyncError::Io`] on any filesystem failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SyncError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SyncError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| SyncError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| SyncError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| SyncError::io(path, e.error))?;
    Ok(())
}

/// Whether `doc` has `modules.drivertagging` holding `tagcategory` and
/// `drivertag` lists.
#[must_use]
pub fn validate_source_a(doc: &Value) -> bool {
    doc.get("modules")
        .and_then(|modules| modules.get("drivertagging"))
        .is_some_and(|tagging| {
            tagging.get("tagcategory").is_some_and(Value::is_array)
                && tagging.get("drivertag").is_some_and(Value::is_array)
        })
}

/// Whether `doc` is a list whose elements all carry `customer_id` and `name`.
#[must_use]
pub fn validate_source_b(doc: &Value) -> bool {
    doc.as_array().is_some_and(|records| {
        records
            .iter()
            .all(|r| r.get("customer_id").is_some() && r.get("name").is_some())
    })
}

/// Adds the reserved category to a raw iOverlay document when it is missing.
///
/// Returns the id of the created category, or `None` if it already existed.
/// Only the in-memory document changes.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] if the document does not have the
/// iOverlay structure.
pub fn ensure_reserved_category(doc: &mut Value) -> Result<Option<i64>, SyncError> {
    let categories = doc
        .pointer_mut("/modules/drivertagging/tagcategory")
        .and_then(Value::as_array_mut)
        .ok_or_else(|| SyncError::Validation(overlay::STRUCTURE_MESSAGE.to_string()))?;

    let exists = categories
        .iter()
        .any(|c| c.get("name").and_then(Value::as_str) == Some(overlay::RESERVED_CATEGORY));
    if exists {
        return Ok(None);
    }

    let id = categories
        .iter()
        .filter_map(|c| c.get("id").and_then(Value::as_i64))
        .max()
        .unwrap_or(0)
        + 1;
    categories.push(serde_json::json!({
        "id": id,
        "name": overlay::RESERVED_CATEGORY,
        "color": overlay::RESERVED_CATEGORY_COLOR,
    }));
    Ok(Some(id))
}

/// Creates an empty CrewChief reputations file when its folder exists but
/// the file does not.
///
/// Returns `true` if the file was created.
///
/// # Errors
///
/// - [`SyncError::NotFound`] if the containing folder does not exist
/// - [`SyncError::Io`] if the file cannot be written
pub fn ensure_reputations_file(path: &Path) -> Result<bool, SyncError> {
    if path.exists() {
        return Ok(false);
    }
    match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() || parent.is_dir() => {
            write_json(path, None)?;
            info!(path = %path.display(), "Created empty CrewChief reputations file");
            Ok(true)
        }
        _ => Err(SyncError::NotFound(path.to_path_buf())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_json(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_read_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(read_json(&path), Err(SyncError::Parse { .. })));
    }

    #[test]
    fn test_write_none_writes_empty_array() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, None).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }

    #[test]
    fn test_write_uses_four_space_indent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, Some(&json!({"a": [1]}))).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\n    \"a\": [\n        1\n    ]\n}"
        );
    }

    #[test]
    fn test_write_replaces_existing_file_without_leftovers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "old").unwrap();
        write_json(&path, Some(&json!([1]))).unwrap();
        assert_eq!(read_json(&path).unwrap(), json!([1]));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_validate_source_a() {
        assert!(validate_source_a(
            &json!({"modules": {"drivertagging": {"tagcategory": [], "drivertag": []}}})
        ));
        assert!(!validate_source_a(
            &json!({"modules": {"drivertagging": {"tagcategory": []}}})
        ));
        assert!(!validate_source_a(
            &json!({"modules": {"drivertagging": {"tagcategory": {}, "drivertag": []}}})
        ));
        assert!(!validate_source_a(&json!([])));
    }

    #[test]
    fn test_validate_source_b() {
        assert!(validate_source_b(&json!([])));
        assert!(validate_source_b(&json!([{"customer_id": 1, "name": "A"}])));
        assert!(!validate_source_b(&json!([{"customer_id": 1}])));
        assert!(!validate_source_b(&json!({"customer_id": 1, "name": "A"})));
    }

    #[test]
    fn test_ensure_reserved_category_appends_next_id() {
        let mut doc = json!({"modules": {"drivertagging": {
            "tagcategory": [{"id": 2, "name": "Friends", "color": "#fff"}, {"id": 7, "name": "Slow", "color": "#000"}],
            "drivertag": []
        }}});
        assert_eq!(ensure_reserved_category(&mut doc).unwrap(), Some(8));
        assert_eq!(ensure_reserved_category(&mut doc).unwrap(), None);
        let categories = doc["modules"]["drivertagging"]["tagcategory"].as_array().unwrap();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[2]["color"], "#00FF00");
    }

    #[test]
    fn test_ensure_reputations_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("iracing_reputations.json");
        assert!(ensure_reputations_file(&path).unwrap());
        assert!(!ensure_reputations_file(&path).unwrap());
        assert_eq!(read_json(&path).unwrap(), json!([]));

        let orphan = dir.path().join("missing/iracing_reputations.json");
        assert!(matches!(
            ensure_reputations_file(&orphan),
            Err(SyncError::NotFound(_))
        ));
    }
}
