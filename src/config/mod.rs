//! Layered settings loading from TOML files and environment variables.

mod builder;
mod env;
mod error;
mod resolve;

pub use builder::Settings;
pub use error::ConfigError;
