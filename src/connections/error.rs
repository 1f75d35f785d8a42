use thiserror::Error;

use super::env::ResolveError;
use crate::dicts::DictsError;

/// Boxed error returned by a database driver.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    #[error("connection '{name}' requires '{field}' (record from '{path}')")]
    MissingField {
        field: String,
        name: String,
        path: String,
    },

    #[error("field '{field}' of connection '{name}' must be a scalar (record from '{path}')")]
    NotScalar {
        field: String,
        name: String,
        path: String,
    },

    #[error("field '{field}' of connection '{name}' has an invalid value: {message}")]
    InvalidValue {
        field: String,
        name: String,
        message: String,
    },

    #[error("secret '{field}' of connection '{name}' must be an environment reference (record from '{path}')")]
    PlaintextSecret {
        field: String,
        name: String,
        path: String,
    },

    #[error("secret '{field}' of connection '{name}' could not be resolved: {source}")]
    UnsetSecret {
        field: String,
        name: String,
        source: ResolveError,
    },

    #[error("field '{field}' of connection '{name}': {source}")]
    Resolve {
        field: String,
        name: String,
        source: ResolveError,
    },

    #[error("no connection named '{0}'")]
    UnknownConnection(String),

    #[error("unsupported database flavour '{flavour}' for connection '{name}'")]
    UnsupportedFlavour { flavour: String, name: String },

    #[error("all {attempts} endpoints of connection '{name}' failed, last error: {last}")]
    AllEndpointsFailed {
        name: String,
        attempts: usize,
        last: DriverError,
    },

    #[error("driver error on connection '{name}': {source}")]
    Driver { name: String, source: DriverError },

    #[error("failed to load connection records: {0}")]
    Load(#[from] DictsError),

    #[error("unable to determine the home directory")]
    NoHomeDir,
}
