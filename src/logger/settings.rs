use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Settings};

/// Variable naming a TOML file with logging settings.
pub const CONFIG_PATH_VAR: &str = "LOG_CONFIG_PATH";

/// Prefix of variables overriding logging settings, e.g. `LOG__FILE__LEVEL`.
pub const ENV_PREFIX: &str = "LOG";

pub const ENV_SEPARATOR: &str = "__";

/// Logging settings.
///
/// Missing keys fall back to [`LogSettings::default`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub console: ConsoleSettings,
    pub file: FileSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    /// Filter directive, e.g. `info` or `revlibs=debug,warn`.
    pub level: String,
    pub ansi: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSettings {
    pub enabled: bool,
    pub path: PathBuf,
    pub level: String,
    pub rotation: Rotation,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("/tmp/revlibs.log"),
            level: "debug".to_string(),
            rotation: Rotation::Hourly,
        }
    }
}

/// How often the log file is rolled over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[serde(alias = "h")]
    Hourly,
    #[serde(alias = "d")]
    Daily,
    Never,
}

impl LogSettings {
    /// Loads settings from the process environment.
    ///
    /// Defaults, then the file named by `LOG_CONFIG_PATH` (required when the
    /// variable is set), then `LOG__*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        let mut settings = Settings::builder().with_defaults(&Self::default())?;
        if let Some(path) = file {
            settings = settings.with_file(path, true);
        }
        settings.with_env(ENV_PREFIX, ENV_SEPARATOR).load()
    }

    /// Like [`load`](Self::load) but reads the given parameters instead of the
    /// process environment.
    pub fn load_with<I, K, V>(params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let params: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let file = params
            .iter()
            .find(|(k, _)| k == CONFIG_PATH_VAR)
            .map(|(_, v)| PathBuf::from(v));

        let mut settings = Settings::builder().with_defaults(&Self::default())?;
        if let Some(path) = file {
            settings = settings.with_file(path, true);
        }
        settings.with_vars(ENV_PREFIX, ENV_SEPARATOR, params).load()
    }
}
