//! JSON record reader.

use std::path::Path;

use crate::error::{InputError, InputResult};
use crate::models::Value;

/// Read a JSON file and return its record list.
pub fn read_json_file(path: &Path, root_path: Option<&str>) -> InputResult<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    parse_json_str(&content, root_path)
}

/// Parse JSON text and return its record list.
///
/// When the root is an object and `root_path` is set, the dotted path is
/// followed first; a missing key yields an empty list. The value reached
/// must be an array.
pub fn parse_json_str(content: &str, root_path: Option<&str>) -> InputResult<Vec<Value>> {
    let mut data: serde_json::Value = serde_json::from_str(content)?;

    if let Some(root_path) = root_path.filter(|p| !p.is_empty()) {
        if data.is_object() {
            for key in root_path.split('.') {
                data = match data {
                    serde_json::Value::Object(mut map) => map
                        .remove(key)
                        .unwrap_or_else(|| serde_json::Value::Array(Vec::new())),
                    _ => return Err(InputError::NotAList),
                };
            }
        }
    }

    match data {
        serde_json::Value::Array(items) => Ok(items.into_iter().map(Value::from).collect()),
        _ => Err(InputError::NotAList),
    }
}
