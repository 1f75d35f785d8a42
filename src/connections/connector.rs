//! Connector factories for database drivers.
//!
//! The drivers themselves are supplied by the caller as closures taking
//! [`ConnectParams`]. Two connection styles are provided:
//!
//! - [`PerHostConnector`] tries each `host:port` endpoint in turn until the
//!   driver accepts one (libpq style `host=H port=P` targets).
//! - [`ClusterConnector`] passes the whole comma separated DSN to the driver
//!   in a single call, leaving failover to it.

use std::fmt;

use secrecy::SecretString;
use serde_json::{Map, Value};

use super::error::DriverError;
use super::{ConnectionConfig, ConnectionError, Environment};

/// A live connection handle.
pub trait Connection: Send {
    fn close(self: Box<Self>) -> Result<(), ConnectionError>;
}

/// Creates connections for one database flavour.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        config: &ConnectionConfig,
        env: &dyn Environment,
    ) -> Result<Box<dyn Connection>, ConnectionError>;
}

/// Everything a driver needs to open one connection.
#[derive(Debug)]
pub struct ConnectParams {
    /// Logical connection name.
    pub name: String,
    /// `host=H port=P` for per-host connectors, the full DSN for cluster ones.
    pub target: String,
    pub user: String,
    pub password: SecretString,
    pub dbname: Option<String>,
    pub schema: Option<String>,
    /// Extra driver parameters from the record's `params` map.
    pub params: Map<String, Value>,
}

impl ConnectParams {
    fn from_config(
        config: &ConnectionConfig,
        target: String,
        env: &dyn Environment,
    ) -> Result<Self, ConnectionError> {
        Ok(Self {
            name: config.name().to_string(),
            target,
            user: config.user(env)?,
            password: config.password(env)?,
            dbname: config.dbname(env)?,
            schema: config.schema(env)?,
            params: config.params(),
        })
    }
}

/// Tries every endpoint of a connection in order.
pub struct PerHostConnector<F> {
    driver: F,
}

impl<F> PerHostConnector<F> {
    pub fn new(driver: F) -> Self {
        Self { driver }
    }

    /// Opens a connection to the first endpoint the driver accepts.
    pub fn open<C, E>(
        &self,
        config: &ConnectionConfig,
        env: &dyn Environment,
    ) -> Result<C, ConnectionError>
    where
        F: Fn(&ConnectParams) -> Result<C, E>,
        E: Into<DriverError>,
    {
        let endpoints = config.endpoints(env)?;
        let attempts = endpoints.len();
        let mut last = None;

        for (host, port) in endpoints {
            let params = ConnectParams::from_config(config, format!("host={host} port={port}"), env)?;
            match (self.driver)(&params) {
                Ok(connection) => {
                    tracing::debug!(connection = %config.name(), %host, port, "connected");
                    return Ok(connection);
                }
                Err(e) => {
                    let e: DriverError = e.into();
                    tracing::warn!(connection = %config.name(), %host, port, error = %e, "endpoint failed");
                    last = Some(e);
                }
            }
        }

        Err(ConnectionError::AllEndpointsFailed {
            name: config.name().to_string(),
            attempts,
            last: last.unwrap_or_else(|| "no endpoints configured".into()),
        })
    }
}

impl<F> fmt::Debug for PerHostConnector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerHostConnector").finish_non_exhaustive()
    }
}

impl<F, C, E> Connector for PerHostConnector<F>
where
    F: Fn(&ConnectParams) -> Result<C, E> + Send + Sync,
    C: Connection + 'static,
    E: Into<DriverError>,
{
    fn connect(
        &self,
        config: &ConnectionConfig,
        env: &dyn Environment,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        Ok(Box::new(self.open(config, env)?))
    }
}

/// Hands the full DSN to the driver in one call.
pub struct ClusterConnector<F> {
    driver: F,
}

impl<F> ClusterConnector<F> {
    pub fn new(driver: F) -> Self {
        Self { driver }
    }

    pub fn open<C, E>(
        &self,
        config: &ConnectionConfig,
        env: &dyn Environment,
    ) -> Result<C, ConnectionError>
    where
        F: Fn(&ConnectParams) -> Result<C, E>,
        E: Into<DriverError>,
    {
        let params = ConnectParams::from_config(config, config.dsn(env)?, env)?;
        (self.driver)(&params).map_err(|e| {
            let e: DriverError = e.into();
            tracing::error!(connection = %config.name(), dsn = %params.target, error = %e, "connection failed");
            ConnectionError::Driver {
                name: config.name().to_string(),
                source: e,
            }
        })
    }
}

impl<F> fmt::Debug for ClusterConnector<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConnector").finish_non_exhaustive()
    }
}

impl<F, C, E> Connector for ClusterConnector<F>
where
    F: Fn(&ConnectParams) -> Result<C, E> + Send + Sync,
    C: Connection + 'static,
    E: Into<DriverError>,
{
    fn connect(
        &self,
        config: &ConnectionConfig,
        env: &dyn Environment,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        Ok(Box::new(self.open(config, env)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicts::Document;
    use secrecy::ExposeSecret;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct FakeConnection {
        target: String,
    }

    impl Connection for FakeConnection {
        fn close(self: Box<Self>) -> Result<(), ConnectionError> {
            Ok(())
        }
    }

    fn config(value: Value) -> ConnectionConfig {
        let Value::Object(map) = value else {
            panic!("expected an object");
        };
        ConnectionConfig::new("pg", Document::new(map))
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([("TEST_PASS".to_string(), "IamAwizard".to_string())])
    }

    #[test]
    fn test_per_host_uses_first_endpoint() {
        let cfg = config(json!({
            "hosts": "127.0.0.1",
            "ports": 5436,
            "user": "test",
            "password": "_env:TEST_PASS"
        }));
        let connector = PerHostConnector::new(|params: &ConnectParams| {
            assert_eq!(params.user, "test");
            assert_eq!(params.password.expose_secret(), "IamAwizard");
            assert_eq!(params.dbname, None);
            Ok::<_, std::io::Error>(FakeConnection {
                target: params.target.clone(),
            })
        });

        let conn = connector.open(&cfg, &env()).unwrap();
        assert_eq!(conn.target, "host=127.0.0.1 port=5436");
    }

    #[test]
    fn test_per_host_fails_over() {
        let cfg = config(json!({
            "hosts": ["127.0.0.1", "127.0.0.2"],
            "ports": [5436],
            "user": "test",
            "password": "_env:TEST_PASS"
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_driver = Arc::clone(&seen);
        let connector = PerHostConnector::new(move |params: &ConnectParams| {
            let mut seen = seen_by_driver.lock().unwrap();
            seen.push(params.target.clone());
            if seen.len() == 1 {
                Err(std::io::Error::other("refused"))
            } else {
                Ok(FakeConnection {
                    target: params.target.clone(),
                })
            }
        });

        let conn = connector.open(&cfg, &env()).unwrap();

        assert_eq!(conn.target, "host=127.0.0.2 port=5436");
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["host=127.0.0.1 port=5436", "host=127.0.0.2 port=5436"]
        );
    }

    #[test]
    fn test_per_host_all_fail() {
        let cfg = config(json!({
            "hosts": ["a", "b"],
            "ports": 1,
            "user": "u",
            "password": "_env:TEST_PASS"
        }));
        let connector = PerHostConnector::new(|_: &ConnectParams| {
            Err::<FakeConnection, _>(std::io::Error::other("down"))
        });

        let err = connector.open(&cfg, &env()).unwrap_err();
        assert!(matches!(err, ConnectionError::AllEndpointsFailed { attempts: 2, .. }));
    }

    #[test]
    fn test_cluster_passes_full_dsn() {
        let cfg = config(json!({
            "dsn": "127.0.0.1:5436,127.0.0.2:5437",
            "user": "test",
            "password": "_env:TEST_PASS",
            "schema": "s"
        }));
        let connector = ClusterConnector::new(|params: &ConnectParams| {
            assert_eq!(params.schema.as_deref(), Some("s"));
            Ok::<_, std::io::Error>(FakeConnection {
                target: params.target.clone(),
            })
        });

        let conn = connector.open(&cfg, &env()).unwrap();
        assert_eq!(conn.target, "127.0.0.1:5436,127.0.0.2:5437");
    }

    #[test]
    fn test_plaintext_password_never_reaches_driver() {
        let cfg = config(json!({
            "hosts": "h",
            "ports": 1,
            "user": "u",
            "password": "hunter2"
        }));
        let connector = ClusterConnector::new(|_: &ConnectParams| -> Result<FakeConnection, std::io::Error> {
            panic!("driver must not be called")
        });

        let err = connector.open(&cfg, &env()).unwrap_err();
        assert!(matches!(err, ConnectionError::PlaintextSecret { .. }));
    }
}
