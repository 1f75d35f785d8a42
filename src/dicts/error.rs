use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DictsError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse YAML file '{path}': {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to parse JSON file '{path}': {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("unexpected document shape in '{path}': {reason}")]
    InvalidShape { path: PathBuf, reason: String },

    #[error("no documents found to load")]
    NoData,

    #[error("non-unique key '{key}' found in {count} documents [{}]", .paths.join(", "))]
    DuplicateKey {
        key: String,
        count: usize,
        paths: Vec<String>,
    },

    #[error("failed to cast document from '{path}': {source}")]
    Cast {
        path: String,
        source: serde_json::Error,
    },
}
