pub mod config;
pub mod connections;
pub mod dicts;
mod error;
pub mod logger;

pub use config::{ConfigError, Settings};
pub use connections::{ConnectionConfig, ConnectionError, Registry};
pub use dicts::{Dicts, DictsError, Document};
pub use error::Error;
pub use logger::{LogGuard, LogSettings, LoggingError};
