//! Named database connections.
//!
//! Connection records are loaded with [`Dicts`](crate::Dicts) and keyed by
//! their `name`. A [`Registry`] picks the [`Connector`] registered for the
//! record's flavour and opens the connection.

mod config;
mod connector;
mod env;
mod error;
mod registry;

pub use config::{parse_dsn, ConnectionConfig, ConnectionRecord, DEFAULT_SECRET_FIELDS};
pub use connector::{ClusterConnector, ConnectParams, Connection, Connector, PerHostConnector};
pub use env::{is_reference, resolve, EnvReference, Environment, ProcessEnv, ResolveError, ENV_MARKER};
pub use error::{ConnectionError, DriverError};
pub use registry::{
    default_location, Registry, RegistryBuilder, CONNECTIONS_ENV_VAR, DEFAULT_DIRECTORY, NAME_FIELD,
};
