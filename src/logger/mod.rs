//! Logging bootstrap.
//!
//! Installs a `tracing` subscriber with a console layer on stderr and, when
//! enabled, a rolling file layer. Each layer has its own level filter, so the
//! file can record `debug` while the console only shows `info`.

mod settings;

use std::path::Path;

use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, InitError, RollingFileAppender};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::ConfigError;

pub use settings::{
    ConsoleSettings, FileSettings, LogSettings, Rotation, CONFIG_PATH_VAR, ENV_PREFIX, ENV_SEPARATOR,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoggingError {
    #[error("invalid log level '{level}': {source}")]
    InvalidLevel { level: String, source: ParseError },

    #[error("failed to create log file appender: {0}")]
    Appender(#[from] InitError),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),

    #[error("failed to load logging settings: {0}")]
    Settings(#[from] ConfigError),
}

/// Keeps the file writer alive; buffered lines are flushed when it is dropped.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Loads [`LogSettings`] from the environment and installs the subscriber.
pub fn init_from_env() -> Result<LogGuard, LoggingError> {
    init(&LogSettings::load()?)
}

/// Installs the subscriber built by [`subscriber`] as the global default.
pub fn init(settings: &LogSettings) -> Result<LogGuard, LoggingError> {
    let (subscriber, guard) = subscriber(settings)?;
    tracing::subscriber::set_global_default(subscriber)?;
    tracing::debug!(
        console = %settings.console.level,
        file = settings.file.enabled,
        path = %settings.file.path.display(),
        "logging initialised"
    );
    Ok(guard)
}

/// Builds the subscriber without installing it.
pub fn subscriber(
    settings: &LogSettings,
) -> Result<(impl Subscriber + Send + Sync, LogGuard), LoggingError> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(settings.console.ansi)
        .with_filter(level_filter(&settings.console.level)?);

    let (file, guard) = if settings.file.enabled {
        let (writer, guard) = tracing_appender::non_blocking(file_appender(&settings.file)?);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_filter(level_filter(&settings.file.level)?);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let subscriber = Registry::default().with(console).with(file);
    Ok((subscriber, LogGuard { _file: guard }))
}

fn level_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(level).map_err(|e| LoggingError::InvalidLevel {
        level: level.to_string(),
        source: e,
    })
}

fn file_appender(settings: &FileSettings) -> Result<RollingFileAppender, LoggingError> {
    let path = settings.path.as_path();
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let prefix = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "revlibs".to_string());

    let mut builder = rolling::Builder::new()
        .rotation(match settings.rotation {
            Rotation::Hourly => rolling::Rotation::HOURLY,
            Rotation::Daily => rolling::Rotation::DAILY,
            Rotation::Never => rolling::Rotation::NEVER,
        })
        .filename_prefix(prefix);
    if let Some(ext) = path.extension() {
        builder = builder.filename_suffix(ext.to_string_lossy().into_owned());
    }
    Ok(builder.build(dir)?)
}
