//! Access to a single named connection record.

use std::collections::BTreeSet;

use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::env::{is_reference, resolve, Environment, ProcessEnv, ResolveError};
use super::ConnectionError;
use crate::dicts::Document;

/// Fields that must be given as `_env:` references.
pub const DEFAULT_SECRET_FIELDS: &[&str] = &["password"];

/// One connection record together with its logical name.
///
/// Field values are resolved on access: environment references are looked
/// up, secret fields are refused when written in plain text.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    name: String,
    document: Document,
    secret_fields: BTreeSet<String>,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, document: Document) -> Self {
        Self {
            name: name.into(),
            document,
            secret_fields: DEFAULT_SECRET_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Replaces the set of fields treated as secrets.
    pub fn with_secret_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the file the record was loaded from.
    pub fn path(&self) -> &str {
        self.document.path()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn contains(&self, field: &str) -> bool {
        self.document.contains_key(field)
    }

    pub fn is_secret(&self, field: &str) -> bool {
        self.secret_fields.contains(field)
    }

    /// Resolves `field` against the process environment.
    pub fn get(&self, field: &str) -> Result<String, ConnectionError> {
        self.get_in(field, &ProcessEnv)
    }

    /// Resolves `field` against `env`.
    ///
    /// Non-secret references to unset variables resolve to an empty string.
    pub fn get_in(&self, field: &str, env: &dyn Environment) -> Result<String, ConnectionError> {
        let raw = self.raw(field)?;
        self.resolve_text(field, &raw, env)
    }

    /// Applies the secret and unset-variable rules of `field` to `raw`.
    fn resolve_text(&self, field: &str, raw: &str, env: &dyn Environment) -> Result<String, ConnectionError> {
        if self.is_secret(field) {
            if !is_reference(raw) {
                return Err(ConnectionError::PlaintextSecret {
                    field: field.to_string(),
                    name: self.name.clone(),
                    path: self.path().to_string(),
                });
            }
            return resolve(raw, env).map_err(|e| ConnectionError::UnsetSecret {
                field: field.to_string(),
                name: self.name.clone(),
                source: e,
            });
        }

        match resolve(raw, env) {
            Ok(value) => Ok(value),
            Err(ResolveError::Unset(var)) => {
                tracing::debug!(connection = %self.name, field, var = %var, "variable unset, using empty value");
                Ok(String::new())
            }
            Err(e) => Err(ConnectionError::Resolve {
                field: field.to_string(),
                name: self.name.clone(),
                source: e,
            }),
        }
    }

    /// Like [`get_in`](Self::get_in) but `None` when the field is absent.
    pub fn get_opt_in(&self, field: &str, env: &dyn Environment) -> Result<Option<String>, ConnectionError> {
        if self.contains(field) {
            self.get_in(field, env).map(Some)
        } else {
            Ok(None)
        }
    }

    /// The password, which must be an environment reference.
    pub fn password(&self, env: &dyn Environment) -> Result<SecretString, ConnectionError> {
        self.get_in("password", env)
            .map(|password| SecretString::new(password.into()))
    }

    pub fn user(&self, env: &dyn Environment) -> Result<String, ConnectionError> {
        self.get_in("user", env)
    }

    pub fn schema(&self, env: &dyn Environment) -> Result<Option<String>, ConnectionError> {
        self.get_opt_in("schema", env)
    }

    pub fn dbname(&self, env: &dyn Environment) -> Result<Option<String>, ConnectionError> {
        self.get_opt_in("dbname", env)
    }

    /// The discriminator choosing a connector, from `flavour` or else `type`.
    pub fn flavour(&self) -> Result<String, ConnectionError> {
        match self.document.get("flavour") {
            Some(_) => self.raw("flavour"),
            None if self.contains("type") => self.raw("type"),
            None => Err(self.missing("flavour")),
        }
    }

    /// Extra driver parameters, empty when absent.
    pub fn params(&self) -> Map<String, Value> {
        match self.document.get("params") {
            Some(Value::Object(params)) => params.clone(),
            _ => Map::new(),
        }
    }

    /// Host names, accepting a single value or a list.
    pub fn hosts(&self, env: &dyn Environment) -> Result<Vec<String>, ConnectionError> {
        self.list("hosts", env)
    }

    /// Ports, extended with the last one to match the number of hosts.
    pub fn ports(&self, env: &dyn Environment) -> Result<Vec<u16>, ConnectionError> {
        let hosts = self.hosts(env)?.len();
        let ports = self
            .list("ports", env)?
            .iter()
            .map(|p| {
                p.parse::<u16>().map_err(|e| ConnectionError::InvalidValue {
                    field: "ports".to_string(),
                    name: self.name.clone(),
                    message: format!("'{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(extend(ports, hosts))
    }

    /// `(host, port)` pairs, from `hosts`/`ports` or parsed from `dsn`.
    pub fn endpoints(&self, env: &dyn Environment) -> Result<Vec<(String, u16)>, ConnectionError> {
        if !self.contains("hosts") && self.contains("dsn") {
            return parse_dsn(&self.get_in("dsn", env)?).map_err(|message| {
                ConnectionError::InvalidValue {
                    field: "dsn".to_string(),
                    name: self.name.clone(),
                    message,
                }
            });
        }
        let hosts = self.hosts(env)?;
        let ports = self.ports(env)?;
        Ok(hosts.into_iter().zip(ports).collect())
    }

    /// Comma separated `host:port` list, or the `dsn` field when present.
    pub fn dsn(&self, env: &dyn Environment) -> Result<String, ConnectionError> {
        if self.contains("dsn") {
            return self.get_in("dsn", env);
        }
        Ok(self
            .endpoints(env)?
            .iter()
            .map(|(host, port)| format!("{host}:{port}"))
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Deserializes the whole record into a typed [`ConnectionRecord`].
    pub fn record(&self) -> Result<ConnectionRecord, ConnectionError> {
        Ok(self.document.cast()?)
    }

    /// Scalar value of `field` as text, without resolving references.
    fn raw(&self, field: &str) -> Result<String, ConnectionError> {
        match self.document.get(field) {
            None => Err(self.missing(field)),
            Some(value) => scalar_text(value).ok_or_else(|| ConnectionError::NotScalar {
                field: field.to_string(),
                name: self.name.clone(),
                path: self.path().to_string(),
            }),
        }
    }

    /// Items of a scalar or list field. Items resolving to empty text are dropped.
    fn list(&self, field: &str, env: &dyn Environment) -> Result<Vec<String>, ConnectionError> {
        match self.document.get(field) {
            None => Err(self.missing(field)),
            Some(Value::Array(items)) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    let text = scalar_text(item).ok_or_else(|| ConnectionError::NotScalar {
                        field: field.to_string(),
                        name: self.name.clone(),
                        path: self.path().to_string(),
                    })?;
                    let value = self.resolve_text(field, &text, env)?;
                    if !value.is_empty() {
                        resolved.push(value);
                    }
                }
                Ok(resolved)
            }
            Some(_) => Ok(as_list(self.get_in(field, env)?)),
        }
    }

    fn missing(&self, field: &str) -> ConnectionError {
        ConnectionError::MissingField {
            field: field.to_string(),
            name: self.name.clone(),
            path: self.path().to_string(),
        }
    }
}

/// Typed form of a connection record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConnectionRecord {
    pub name: String,
    #[serde(alias = "type")]
    pub flavour: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, deserialize_with = "one_or_many")]
    pub hosts: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub ports: Vec<u16>,
    pub dsn: Option<String>,
    pub user: Option<String>,
    /// The stored reference, not the resolved secret.
    pub password: Option<String>,
    pub schema: Option<String>,
    pub dbname: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Splits a comma separated value into a list.
fn as_list(value: String) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Pads `items` with copies of its last element up to `len`.
fn extend<T: Clone>(mut items: Vec<T>, len: usize) -> Vec<T> {
    if let Some(last) = items.last().cloned() {
        while items.len() < len {
            items.push(last.clone());
        }
    }
    items
}

/// Parses `host:port[,host:port...]`.
pub fn parse_dsn(dsn: &str) -> Result<Vec<(String, u16)>, String> {
    dsn.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (host, port) = part
                .rsplit_once(':')
                .ok_or_else(|| format!("'{part}' is not host:port"))?;
            let port = port
                .parse::<u16>()
                .map_err(|e| format!("invalid port in '{part}': {e}"))?;
            Ok((host.to_string(), port))
        })
        .collect()
}
