use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("required settings file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize default settings: {0}")]
    Defaults(toml::ser::Error),

    #[error("default settings must serialize to a table")]
    DefaultsNotTable,

    #[error("failed to deserialize settings: {0}")]
    Deserialize(toml::de::Error),

    /// References still changing after the pass limit.
    #[error("settings references do not settle, check for a cycle")]
    CircularReference,

    #[error("reference '${{{0}}}' does not match any setting")]
    ReferenceNotFound(String),

    #[error("reference '${{{0}}}' has an empty path segment")]
    InvalidReferencePath(String),

    #[error("reference '${{{0}}}' points at a table or array")]
    NonScalarReference(String),

    #[error("'${{' without a closing '}}'")]
    UnclosedReference,
}
