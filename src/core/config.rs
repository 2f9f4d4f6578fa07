use crate::error::Error;
use crate::utils::io;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::path::Path;

// ============================================================================
// JSON Parsing Utilities (internal)
// ============================================================================

/// Parse JSON string into typed value.
pub(crate) fn from_str<T: DeserializeOwned>(s: &str, path: &Path) -> Result<T> {
    serde_json::from_str(s).map_err(|e| Error::config_invalid_json(path.display().to_string(), e))
}

/// Serialize value to pretty-printed JSON string.
pub(crate) fn to_string_pretty<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize json".to_string())))
}

/// Load a JSON document, returning None when the file does not exist.
pub(crate) fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = io::read_file(path, &format!("read {}", path.display()))?;
    from_str(&content, path).map(Some)
}

/// Write a JSON document with a trailing newline.
pub(crate) fn save_json_file<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let mut content = to_string_pretty(data)?;
    content.push('\n');
    io::write_file_atomic(path, &content, &format!("write {}", path.display()))
}

// ============================================================================
// Merge
// ============================================================================

/// Merge `patch` into `base`.
///
/// Objects merge key by key, arrays are unioned, any other patch value
/// replaces the base value. A null patch value removes the key.
pub(crate) fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_obj), Value::Object(patch_obj)) => {
            for (key, value) in patch_obj {
                if value.is_null() {
                    base_obj.remove(&key);
                } else {
                    deep_merge(base_obj.entry(key).or_insert(Value::Null), value);
                }
            }
        }
        (Value::Array(base_arr), Value::Array(patch_arr)) => {
            array_union(base_arr, patch_arr);
        }
        (base, patch) => *base = patch,
    }
}

fn array_union(base: &mut Vec<Value>, patch: Vec<Value>) {
    for item in patch {
        if !base.contains(&item) {
            base.push(item);
        }
    }
}
