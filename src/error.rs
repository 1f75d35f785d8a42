use crate::config::ConfigError;
use crate::connections::ConnectionError;
use crate::dicts::DictsError;
use crate::logger::LoggingError;
use thiserror::Error;

/// Top-level error type for the revlibs library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("document error: {0}")]
    Dicts(#[from] DictsError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),
}
