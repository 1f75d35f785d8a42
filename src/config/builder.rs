use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::env::merge_vars;
use super::resolve::resolve_references;
use super::ConfigError;

/// One layer of the settings pipeline.
#[derive(Debug)]
enum Layer {
    Defaults(toml::Table),
    File { path: PathBuf, required: bool },
    ProcessEnv { prefix: String, separator: String },
    Vars {
        prefix: String,
        separator: String,
        vars: Vec<(String, String)>,
    },
}

/// Layered settings loader.
///
/// Layers are merged in registration order, later ones overriding earlier
/// ones. Nested tables merge recursively; other values (arrays included) are
/// replaced.
///
/// String values may reference other values with `${path.to.field}`; `$$`
/// escapes a literal `$`. References are resolved after all layers are merged.
///
/// ## Example
///
/// ```no_run
/// use revlibs::Settings;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Logging {
///     dir: String,
///     path: String,
/// }
///
/// // LOG__DIR=/var/log/app overrides the file value
/// let logging: Logging = Settings::builder()
///     .with_file("logging.toml", true)
///     .with_env("LOG", "__")
///     .load()?;
/// # Ok::<(), revlibs::ConfigError>(())
/// ```
#[derive(Debug, Default)]
#[must_use = "builders do nothing until .load() is called"]
pub struct Settings {
    layers: Vec<Layer>,
}

impl Settings {
    pub fn builder() -> Self {
        Self::default()
    }

    /// Adds a serialized value as the lowest layer, typically `T::default()`.
    pub fn with_defaults<T: Serialize>(mut self, defaults: &T) -> Result<Self, ConfigError> {
        let table = match toml::Value::try_from(defaults).map_err(ConfigError::Defaults)? {
            toml::Value::Table(table) => table,
            _ => return Err(ConfigError::DefaultsNotTable),
        };
        self.layers.push(Layer::Defaults(table));
        Ok(self)
    }

    /// Adds a TOML file. A missing optional file is skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.layers.push(Layer::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Adds process environment variables named `{prefix}{separator}{path}`.
    ///
    /// The remainder after the prefix is split on `separator` and lowercased to
    /// form the settings path, so with prefix `LOG` and separator `__`,
    /// `LOG__FILE__LEVEL` sets `file.level`. Values are coerced to boolean,
    /// integer or float where they parse as one, else kept as strings.
    pub fn with_env(mut self, prefix: impl Into<String>, separator: impl Into<String>) -> Self {
        self.layers.push(Layer::ProcessEnv {
            prefix: prefix.into(),
            separator: separator.into(),
        });
        self
    }

    /// Like [`with_env`](Self::with_env) but reads from explicit variables.
    pub fn with_vars<I, K, V>(
        mut self,
        prefix: impl Into<String>,
        separator: impl Into<String>,
        vars: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.layers.push(Layer::Vars {
            prefix: prefix.into(),
            separator: separator.into(),
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        });
        self
    }

    /// Merges every layer, resolves references and deserializes the result.
    pub fn load<T: DeserializeOwned>(self) -> Result<T, ConfigError> {
        let mut merged = toml::Table::new();

        for layer in self.layers {
            match layer {
                Layer::Defaults(table) => deep_merge(&mut merged, table),
                Layer::File { path, required } => {
                    if let Some(table) = read_table(&path, required)? {
                        tracing::debug!(path = %path.display(), "merged settings file");
                        deep_merge(&mut merged, table);
                    }
                }
                Layer::ProcessEnv { prefix, separator } => {
                    merge_vars(&mut merged, &prefix, &separator, std::env::vars());
                }
                Layer::Vars {
                    prefix,
                    separator,
                    vars,
                } => {
                    merge_vars(&mut merged, &prefix, &separator, vars);
                }
            }
        }

        resolve_references(&mut merged)?;

        toml::Value::Table(merged)
            .try_into()
            .map_err(ConfigError::Deserialize)
    }
}

/// Reads a TOML file, `Ok(None)` when it is optional and missing.
fn read_table(path: &Path, required: bool) -> Result<Option<toml::Table>, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
            tracing::debug!(path = %path.display(), "optional settings file not found");
            return Ok(None);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
}

fn deep_merge(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(inner)), toml::Value::Table(overlay_inner)) => {
                deep_merge(inner, overlay_inner);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
