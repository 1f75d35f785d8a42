//! Single-file document source.
//!
//! A file is parsed according to its extension (`.yaml`, `.yml` or `.json`).
//! YAML files may hold several `---` separated documents. A top-level
//! sequence is flattened so that each element becomes its own [`Document`].

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{DictsError, Document};

/// Shape of one parsed value before it is flattened into documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    Single(Map<String, Value>),
    Sequence(Vec<Map<String, Value>>),
}

impl Parsed {
    /// Classifies a raw value. Returns `Ok(None)` for an empty (null) document.
    fn classify(value: Value, path: &Path) -> Result<Option<Self>, DictsError> {
        match value {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(Parsed::Single(map))),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => Ok(map),
                    other => Err(invalid_shape(
                        path,
                        format!("element {index} is {}, expected a mapping", kind(&other)),
                    )),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(|maps| Some(Parsed::Sequence(maps))),
            other => Err(invalid_shape(
                path,
                format!("top-level value is {}, expected a mapping or a sequence", kind(&other)),
            )),
        }
    }

    fn into_maps(self) -> Vec<Map<String, Value>> {
        match self {
            Parsed::Single(map) => vec![map],
            Parsed::Sequence(maps) => maps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Some(Format::Yaml),
            Some("json") => Some(Format::Json),
            _ => None,
        }
    }
}

/// Returns `true` if the file extension is one this source can parse.
pub fn is_loadable(path: &Path) -> bool {
    Format::from_path(path).is_some()
}

/// Loads every document from a single file.
///
/// Unrecognized extensions yield an empty vector. Each document is tagged with
/// the canonical form of `path`.
pub fn load_file(path: &Path) -> Result<Vec<Document>, DictsError> {
    let Some(format) = Format::from_path(path) else {
        tracing::debug!(path = %path.display(), "extension not loadable, skipping");
        return Ok(Vec::new());
    };

    let read_error = |e| DictsError::Read {
        path: path.to_path_buf(),
        source: e,
    };
    let canonical = std::fs::canonicalize(path).map_err(read_error)?;
    let contents = std::fs::read_to_string(&canonical).map_err(read_error)?;

    let parsed = match format {
        Format::Yaml => parse_yaml(&contents, &canonical)?,
        Format::Json => parse_json(&contents, &canonical)?,
    };

    let provenance = canonical.to_string_lossy();
    let documents: Vec<Document> = parsed
        .into_iter()
        .flat_map(Parsed::into_maps)
        .map(|map| Document::from_file(map, &provenance))
        .collect();

    tracing::debug!(path = %provenance, count = documents.len(), "loaded documents");
    Ok(documents)
}

fn parse_yaml(contents: &str, path: &Path) -> Result<Vec<Parsed>, DictsError> {
    let mut parsed = Vec::new();
    let yaml_error = |e| DictsError::Yaml {
        path: path.to_path_buf(),
        source: e,
    };
    for document in serde_yaml::Deserializer::from_str(contents) {
        let mut yaml = serde_yaml::Value::deserialize(document).map_err(yaml_error)?;
        // `<<: *anchor` keys
        yaml.apply_merge().map_err(yaml_error)?;
        // numeric keys become strings, keys JSON cannot hold are rejected
        let value = serde_json::to_value(&yaml).map_err(|e| invalid_shape(path, e.to_string()))?;
        parsed.extend(Parsed::classify(value, path)?);
    }
    Ok(parsed)
}

fn parse_json(contents: &str, path: &Path) -> Result<Vec<Parsed>, DictsError> {
    let value: Value = serde_json::from_str(contents).map_err(|e| DictsError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Parsed::classify(value, path)?.into_iter().collect())
}

fn invalid_shape(path: &Path, reason: String) -> DictsError {
    DictsError::InvalidShape {
        path: path.to_path_buf(),
        reason,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}
