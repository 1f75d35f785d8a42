//! Environment indirection for record values.
//!
//! A value of the form `_env:NAME` or `_env:NAME:default` is not stored in the
//! file; it is read from the environment when the field is accessed. Anything
//! after the second `:` is the default, colons included.

use std::collections::HashMap;

use thiserror::Error;

/// Prefix marking a value as an environment reference.
pub const ENV_MARKER: &str = "_env:";

/// A source of variables to resolve references against.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("environment variable '{0}' is not set and no default was given")]
    Unset(String),

    #[error("invalid environment reference '{0}'")]
    InvalidReference(String),
}

/// A parsed `_env:` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvReference<'a> {
    pub name: &'a str,
    pub default: Option<&'a str>,
}

impl<'a> EnvReference<'a> {
    /// Parses `raw`, returning `None` if it is a plain value.
    pub fn parse(raw: &'a str) -> Option<Self> {
        let rest = raw.strip_prefix(ENV_MARKER)?;
        let (name, default) = match rest.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (rest, None),
        };
        Some(Self { name, default })
    }
}

/// Returns `true` if `raw` is an environment reference.
pub fn is_reference(raw: &str) -> bool {
    raw.starts_with(ENV_MARKER)
}

/// Resolves `raw` against `env`.
///
/// Plain values are returned unchanged. A reference resolves to the variable,
/// then to its default; with neither it is [`ResolveError::Unset`].
pub fn resolve(raw: &str, env: &dyn Environment) -> Result<String, ResolveError> {
    let Some(reference) = EnvReference::parse(raw) else {
        return Ok(raw.to_string());
    };
    if reference.name.is_empty() {
        return Err(ResolveError::InvalidReference(raw.to_string()));
    }
    env.var(reference.name)
        .or_else(|| reference.default.map(str::to_string))
        .ok_or_else(|| ResolveError::Unset(reference.name.to_string()))
}
