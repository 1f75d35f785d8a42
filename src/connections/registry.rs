//! Named connections mapped to the connectors that open them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{Connection, ConnectionConfig, ConnectionError, Connector, Environment, ProcessEnv};
use crate::dicts::Dicts;

/// Environment variable overriding the connections directory.
pub const CONNECTIONS_ENV_VAR: &str = "REVLIB_CONNECTIONS";

/// Directory under the home directory used when the variable is unset.
pub const DEFAULT_DIRECTORY: &str = ".revconnect";

/// Field naming a connection record.
pub const NAME_FIELD: &str = "name";

/// Where connection records are read from by default.
///
/// `$REVLIB_CONNECTIONS` if set, otherwise `~/.revconnect/`.
pub fn default_location() -> Result<PathBuf, ConnectionError> {
    if let Some(dir) = std::env::var_os(CONNECTIONS_ENV_VAR).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(DEFAULT_DIRECTORY))
        .ok_or(ConnectionError::NoHomeDir)
}

/// Builder for a [`Registry`].
///
/// ## Example
///
/// ```no_run
/// use revlibs::connections::{ConnectParams, PerHostConnector, Registry};
/// # #[derive(Debug)] struct PgConn;
/// # impl revlibs::connections::Connection for PgConn {
/// #     fn close(self: Box<Self>) -> Result<(), revlibs::connections::ConnectionError> { Ok(()) }
/// # }
///
/// let registry = Registry::builder()
///     .with_connector(
///         "postgres",
///         PerHostConnector::new(|_params: &ConnectParams| Ok::<_, std::io::Error>(PgConn)),
///     )
///     .load("/etc/revconnect")?;
///
/// registry.with_connection("warehouse", |_conn| {
///     // run queries
/// })?;
/// # Ok::<(), revlibs::connections::ConnectionError>(())
/// ```
#[must_use = "builders do nothing until .load() is called"]
pub struct RegistryBuilder {
    connectors: HashMap<String, Box<dyn Connector>>,
    env: Box<dyn Environment>,
    secret_fields: Option<Vec<String>>,
}

impl RegistryBuilder {
    /// Registers the connector used for records of the given flavour.
    pub fn with_connector(mut self, flavour: impl Into<String>, connector: impl Connector + 'static) -> Self {
        self.connectors.insert(flavour.into(), Box::new(connector));
        self
    }

    /// Environment used to resolve `_env:` references. Defaults to the process environment.
    pub fn with_environment(mut self, env: impl Environment + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Fields that must be environment references, `password` by default.
    pub fn with_secret_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Loads connection records from a file or directory.
    pub fn load(self, path: impl AsRef<Path>) -> Result<Registry, ConnectionError> {
        let dicts = Dicts::from_path(path)?;
        self.from_dicts(&dicts)
    }

    /// Loads connection records from [`default_location`].
    pub fn load_default(self) -> Result<Registry, ConnectionError> {
        let path = default_location()?;
        tracing::debug!(path = %path.display(), "loading connections");
        self.load(path)
    }

    /// Builds the registry from already loaded records.
    pub fn from_dicts(self, dicts: &Dicts) -> Result<Registry, ConnectionError> {
        let unnamed = dicts.iter().find(|doc| match doc.get(NAME_FIELD) {
            None | Some(Value::Null) => true,
            Some(Value::String(name)) => name.trim().is_empty(),
            Some(_) => false,
        });
        if let Some(unnamed) = unnamed {
            return Err(ConnectionError::MissingField {
                field: NAME_FIELD.to_string(),
                name: String::new(),
                path: unnamed.path().to_string(),
            });
        }

        let secret_fields = self.secret_fields;
        let connections = dicts
            .map_by(NAME_FIELD, "")?
            .into_iter()
            .map(|(name, document)| {
                let config = ConnectionConfig::new(name.clone(), document);
                let config = match &secret_fields {
                    Some(fields) => config.with_secret_fields(fields.iter().cloned()),
                    None => config,
                };
                (name, config)
            })
            .collect::<BTreeMap<_, _>>();

        tracing::info!(count = connections.len(), "loaded connections");
        Ok(Registry {
            connections,
            connectors: self.connectors,
            env: self.env,
        })
    }
}

/// Resolves logical connection names to live connections.
///
/// Connectors are registered explicitly per flavour; nothing is global.
pub struct Registry {
    connections: BTreeMap<String, ConnectionConfig>,
    connectors: HashMap<String, Box<dyn Connector>>,
    env: Box<dyn Environment>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            connectors: HashMap::new(),
            env: Box::new(ProcessEnv),
            secret_fields: None,
        }
    }

    /// Names of all enabled connections, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }

    pub fn config(&self, name: &str) -> Result<&ConnectionConfig, ConnectionError> {
        self.connections
            .get(name)
            .ok_or_else(|| ConnectionError::UnknownConnection(name.to_string()))
    }

    /// Opens the named connection with the connector registered for its flavour.
    pub fn connect(&self, name: &str) -> Result<Box<dyn Connection>, ConnectionError> {
        let config = self.config(name)?;
        let flavour = config.flavour()?;
        let connector = self.connectors.get(&flavour).ok_or_else(|| {
            tracing::error!(connection = name, %flavour, "unsupported database flavour");
            ConnectionError::UnsupportedFlavour {
                flavour: flavour.clone(),
                name: name.to_string(),
            }
        })?;
        tracing::debug!(connection = name, %flavour, "connecting");
        connector.connect(config, self.env.as_ref())
    }

    /// Opens the named connection, runs `f` with it, then closes it.
    pub fn with_connection<R, F>(&self, name: &str, f: F) -> Result<R, ConnectionError>
    where
        F: FnOnce(&mut dyn Connection) -> R,
    {
        let mut connection = self.connect(name)?;
        let result = f(connection.as_mut());
        connection.close()?;
        Ok(result)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("connections", &self.connections.keys().collect::<Vec<_>>())
            .field("connectors", &self.connectors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connections::ConnectParams;
    use crate::connections::PerHostConnector;
    use serde_json::{json, Map, Value};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingConnection {
        closed: Arc<AtomicUsize>,
    }

    impl Connection for CountingConnection {
        fn close(self: Box<Self>) -> Result<(), ConnectionError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn records(values: Vec<Value>) -> Dicts {
        let maps: Vec<Map<String, Value>> = values
            .into_iter()
            .map(|v| match v {
                Value::Object(map) => map,
                other => panic!("expected an object, got {other}"),
            })
            .collect();
        Dicts::from_documents(maps).unwrap()
    }

    fn env() -> HashMap<String, String> {
        HashMap::from([("TEST_PASS".to_string(), "IamAwizard".to_string())])
    }

    fn sample() -> Dicts {
        records(vec![
            json!({
                "name": "postgres_simple",
                "flavour": "postgres",
                "hosts": "127.0.0.1",
                "ports": 5436,
                "user": "test",
                "password": "_env:TEST_PASS"
            }),
            json!({
                "name": "postgres_disabled",
                "flavour": "postgres",
                "disabled": true
            }),
            json!({
                "name": "mystery",
                "flavour": "oracle"
            }),
        ])
    }

    #[test]
    fn test_connect_and_close() {
        let closed = Arc::new(AtomicUsize::new(0));
        let closed_by_conn = Arc::clone(&closed);
        let registry = Registry::builder()
            .with_environment(env())
            .with_connector(
                "postgres",
                PerHostConnector::new(move |_: &ConnectParams| {
                    Ok::<_, std::io::Error>(CountingConnection {
                        closed: Arc::clone(&closed_by_conn),
                    })
                }),
            )
            .from_dicts(&sample())
            .unwrap();

        let out = registry.with_connection("postgres_simple", |_| 42).unwrap();

        assert_eq!(out, 42);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_connection_is_unknown() {
        let registry = Registry::builder().from_dicts(&sample()).unwrap();

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["mystery", "postgres_simple"]);
        assert!(matches!(
            registry.connect("postgres_disabled"),
            Err(ConnectionError::UnknownConnection(_))
        ));
    }

    #[test]
    fn test_unsupported_flavour() {
        let registry = Registry::builder().from_dicts(&sample()).unwrap();

        assert!(matches!(
            registry.connect("mystery"),
            Err(ConnectionError::UnsupportedFlavour { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dicts = records(vec![
            json!({"name": "dup", "flavour": "postgres", "__PATH__": "/a.yaml"}),
            json!({"name": "dup", "flavour": "postgres", "__PATH__": "/b.yaml"}),
        ]);

        let err = Registry::builder().from_dicts(&dicts).unwrap_err();

        let message = err.to_string();
        assert!(message.contains("/a.yaml"), "{message}");
        assert!(message.contains("/b.yaml"), "{message}");
    }

    #[test]
    fn test_unnamed_record_rejected() {
        let dicts = records(vec![json!({"flavour": "postgres", "__PATH__": "/c.yaml"})]);

        let err = Registry::builder().from_dicts(&dicts).unwrap_err();

        assert!(matches!(err, ConnectionError::MissingField { ref path, .. } if path == "/c.yaml"));
    }

    #[test]
    fn test_null_or_blank_name_rejected() {
        for name in [json!(null), json!(""), json!("  ")] {
            let dicts = records(vec![
                json!({"name": "ok", "flavour": "postgres", "__PATH__": "/a.yaml"}),
                json!({"name": name, "flavour": "postgres", "__PATH__": "/d.yaml"}),
            ]);

            let err = Registry::builder().from_dicts(&dicts).unwrap_err();

            assert!(
                matches!(err, ConnectionError::MissingField { ref field, ref path, .. } if field == "name" && path == "/d.yaml"),
                "{err}"
            );
        }
    }

    #[test]
    #[serial]
    fn test_default_location_from_env() {
        temp_env::with_var(CONNECTIONS_ENV_VAR, Some("/srv/connections"), || {
            assert_eq!(default_location().unwrap(), PathBuf::from("/srv/connections"));
        });
    }
}
