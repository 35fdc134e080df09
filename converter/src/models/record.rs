//! Source-agnostic input record.
//!
//! A CSV row and a parsed JSON object both normalize to a [`Record`]: a mapping
//! from keys to [`Value`]s, where values may nest further records or lists.
//! Records are built once by the readers and never mutated afterwards.

use std::collections::BTreeMap;

use serde_json::Number;

/// A single value inside a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null (JSON `null`). Resolves as absent.
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Value>),
    Map(Record),
}

impl Value {
    /// Borrow the nested record if this is a mapping.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Map(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow the items if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the text if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "object",
        }
    }

    /// True for null, empty strings, empty lists and empty mappings.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            Value::Map(record) => record.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Render the value as output text.
    ///
    /// Scalars render naturally; lists and mappings render as compact JSON.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => s.clone(),
            Value::List(_) | Value::Map(_) => serde_json::Value::from(self).to_string(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Map(record) => serde_json::Value::Object(
                record
                    .fields
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

/// An immutable mapping from keys to values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    /// Number of top-level keys.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Top-level lookup, no path splitting.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Resolve a dotted path (`a.b.c`) through nested mappings.
    ///
    /// Returns `None` when the path is empty, a key is missing, an
    /// intermediate value is not a mapping, or the final value is null.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }

        let mut keys = path.split('.');
        let mut current = self.fields.get(keys.next()?)?;

        for key in keys {
            current = match current {
                Value::Map(record) => record.fields.get(key)?,
                Value::Null
                | Value::Bool(_)
                | Value::Number(_)
                | Value::Text(_)
                | Value::List(_) => return None,
            };
        }

        match current {
            Value::Null => None,
            value => Some(value),
        }
    }

    /// Resolve a path and render it as text, treating blank values as absent.
    pub fn resolve_text(&self, path: &str) -> Option<String> {
        self.resolve(path)
            .filter(|v| !v.is_blank())
            .map(Value::to_text)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> Record {
        match Value::from(json!({
            "award_id": "123",
            "amount": 5000,
            "project": {
                "title": "Soil carbon",
                "lead": { "name": "Doe, Jan" },
                "tags": ["a", "b"],
                "closed": null
            }
        })) {
            Value::Map(record) => record,
            other => panic!("expected object, got {}", other.kind()),
        }
    }

    #[test]
    fn test_resolve_top_level() {
        let record = nested();
        assert_eq!(record.resolve("award_id"), Some(&Value::Text("123".into())));
    }

    #[test]
    fn test_resolve_nested_path() {
        let record = nested();
        assert_eq!(
            record.resolve("project.lead.name").and_then(Value::as_str),
            Some("Doe, Jan")
        );
    }

    #[test]
    fn test_resolve_absent_paths() {
        let record = nested();
        assert!(record.resolve("").is_none());
        assert!(record.resolve("missing").is_none());
        assert!(record.resolve("project.missing").is_none());
        // intermediate value is a string
        assert!(record.resolve("award_id.value").is_none());
        // intermediate value is a list
        assert!(record.resolve("project.tags.0").is_none());
        // explicit null
        assert!(record.resolve("project.closed").is_none());
        assert!(record.resolve("project.closed.deeper").is_none());
        assert!(record.resolve("project..title").is_none());
    }

    #[test]
    fn test_resolve_text_stringifies() {
        let record = nested();
        assert_eq!(record.resolve_text("amount").as_deref(), Some("5000"));
        assert_eq!(record.resolve_text("project.tags").as_deref(), Some(r#"["a","b"]"#));
    }

    #[test]
    fn test_resolve_text_blank_is_absent() {
        let record: Record = [("title", Value::from(""))].into_iter().collect();
        assert!(record.resolve_text("title").is_none());
        assert!(record.resolve("title").is_some());
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::from(json!([1])).kind(), "list");
        assert_eq!(Value::from(json!("x")).kind(), "string");
        assert_eq!(Value::from(json!({})).kind(), "object");
    }
}
