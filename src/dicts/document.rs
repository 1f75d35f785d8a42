//! A single configuration record tagged with where it came from.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::DictsError;

/// Key injected into every document, holding the path of the file it was loaded from.
pub const PATH_KEY: &str = "__PATH__";

/// Provenance of documents that were not loaded from a file.
pub const DEFAULT_PATH: &str = "_";

/// One parsed record: an ordered map of string keys to values.
///
/// The record always carries [`PATH_KEY`]. Documents built with
/// [`Document::new`] get [`DEFAULT_PATH`] unless the map already has a string path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Wraps `fields`, tagging them with [`DEFAULT_PATH`] unless they already
    /// carry a string provenance path.
    pub fn new(fields: Map<String, Value>) -> Self {
        let mut document = Self { fields };
        if !document.fields.get(PATH_KEY).is_some_and(Value::is_string) {
            document.set_path(DEFAULT_PATH);
        }
        document
    }

    pub(crate) fn from_file(fields: Map<String, Value>, path: &str) -> Self {
        let mut document = Self { fields };
        document.set_path(path);
        document
    }

    fn set_path(&mut self, path: &str) {
        self.fields
            .insert(PATH_KEY.to_string(), Value::String(path.to_string()));
    }

    /// The originating file path, or [`DEFAULT_PATH`].
    pub fn path(&self) -> &str {
        self.fields
            .get(PATH_KEY)
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PATH)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// All fields, including the provenance key.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// All fields except the provenance key.
    pub fn content(&self) -> Map<String, Value> {
        self.fields
            .iter()
            .filter(|(key, _)| key.as_str() != PATH_KEY)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// Returns `true` if the value under `key` is truthy.
    pub fn is_flagged(&self, key: &str) -> bool {
        self.fields.get(key).is_some_and(is_truthy)
    }

    /// Deserializes the record, without the provenance key, into `T`.
    pub fn cast<T: DeserializeOwned>(&self) -> Result<T, DictsError> {
        serde_json::from_value(Value::Object(self.content())).map_err(|e| DictsError::Cast {
            path: self.path().to_string(),
            source: e,
        })
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Loose truthiness: null, false, zero, and empty strings or collections are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected an object, got {other}"),
        }
    }

    #[test]
    fn test_new_tags_default_path() {
        let doc = Document::new(map(json!({"name": "x"})));
        assert_eq!(doc.path(), DEFAULT_PATH);
        assert_eq!(doc.get(PATH_KEY), Some(&json!("_")));
    }

    #[test]
    fn test_new_keeps_existing_path() {
        let doc = Document::new(map(json!({"name": "x", "__PATH__": "/etc/a.yaml"})));
        assert_eq!(doc.path(), "/etc/a.yaml");
    }

    #[test]
    fn test_new_replaces_non_string_path() {
        let doc = Document::new(map(json!({"a": 1, "__PATH__": 5})));
        assert_eq!(doc.path(), DEFAULT_PATH);
        assert_eq!(doc.get(PATH_KEY), Some(&json!(DEFAULT_PATH)));
    }

    #[test]
    fn test_content_strips_provenance() {
        let doc = Document::from_file(map(json!({"a": 1})), "/tmp/a.json");
        assert_eq!(doc.content(), map(json!({"a": 1})));
        assert!(doc.contains_key(PATH_KEY));
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("yes")));
    }

    #[test]
    fn test_cast_reports_path() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Record {
            port: u16,
        }

        let doc = Document::from_file(map(json!({"port": "nope"})), "/tmp/bad.yaml");
        let err = doc.cast::<Record>().unwrap_err();
        assert!(matches!(err, DictsError::Cast { ref path, .. } if path == "/tmp/bad.yaml"));
    }
}
