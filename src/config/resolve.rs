//! `${path.to.field}` references between settings values.
//!
//! `$${...}` produces a literal `${...}`.

use toml::{Table, Value};

use super::ConfigError;

const MAX_PASSES: usize = 64;

/// Substitutes every reference in `table` until none remain.
///
/// References may point at values that are themselves references; a chain
/// that never settles is reported as [`ConfigError::CircularReference`].
pub(super) fn resolve_references(table: &mut Table) -> Result<(), ConfigError> {
    for _ in 0..MAX_PASSES {
        let snapshot = table.clone();
        let mut changed = false;
        for (_, value) in table.iter_mut() {
            changed |= substitute_value(value, &snapshot)?;
        }
        if !changed {
            for (_, value) in table.iter_mut() {
                unescape_value(value);
            }
            return Ok(());
        }
    }
    Err(ConfigError::CircularReference)
}

/// Collapses `$$` to `$` once every reference is resolved.
fn unescape_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = s.replace("$$", "$"),
        Value::Array(items) => items.iter_mut().for_each(unescape_value),
        Value::Table(inner) => inner.iter_mut().for_each(|(_, v)| unescape_value(v)),
        _ => {}
    }
}

fn substitute_value(value: &mut Value, root: &Table) -> Result<bool, ConfigError> {
    match value {
        Value::String(s) => {
            let (text, substituted) = substitute(s, root)?;
            *s = text;
            Ok(substituted)
        }
        Value::Array(items) => {
            let mut changed = false;
            for item in items {
                changed |= substitute_value(item, root)?;
            }
            Ok(changed)
        }
        Value::Table(inner) => {
            let mut changed = false;
            for (_, item) in inner.iter_mut() {
                changed |= substitute_value(item, root)?;
            }
            Ok(changed)
        }
        _ => Ok(false),
    }
}

/// Returns the substituted text and whether any reference was replaced.
fn substitute(input: &str, root: &Table) -> Result<(String, bool), ConfigError> {
    let mut out = String::with_capacity(input.len());
    let mut substituted = false;
    let mut rest = input;

    while let Some(at) = rest.find('$') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            // kept escaped until the final pass
            out.push_str("$$");
            rest = tail;
        } else if let Some(body) = after.strip_prefix('{') {
            let end = body.find('}').ok_or(ConfigError::UnclosedReference)?;
            out.push_str(&lookup(root, &body[..end])?);
            substituted = true;
            rest = &body[end + 1..];
        } else {
            out.push('$');
            rest = after;
        }
    }
    out.push_str(rest);

    Ok((out, substituted))
}

fn lookup(root: &Table, path: &str) -> Result<String, ConfigError> {
    if path.split('.').any(str::is_empty) {
        return Err(ConfigError::InvalidReferencePath(path.to_string()));
    }

    let mut segments = path.split('.');
    let first = segments.next().unwrap_or_default();
    let mut current = root
        .get(first)
        .ok_or_else(|| ConfigError::ReferenceNotFound(path.to_string()))?;
    for segment in segments {
        current = current
            .get(segment)
            .ok_or_else(|| ConfigError::ReferenceNotFound(path.to_string()))?;
    }

    match current {
        Value::String(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Boolean(b) => Ok(b.to_string()),
        Value::Datetime(dt) => Ok(dt.to_string()),
        Value::Array(_) | Value::Table(_) => Err(ConfigError::NonScalarReference(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(source: &str) -> Table {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn test_reference_into_section() {
        let mut t = table(
            r#"
            [file]
            dir = "/var/log"
            path = "${file.dir}/app.log"
            "#,
        );
        resolve_references(&mut t).unwrap();
        assert_eq!(t["file"]["path"].as_str(), Some("/var/log/app.log"));
    }

    #[test]
    fn test_chained_and_numeric() {
        let mut t = table(
            r#"
            port = 514
            host = "syslog"
            target = "${host}:${port}"
            url = "udp://${target}"
            "#,
        );
        resolve_references(&mut t).unwrap();
        assert_eq!(t["url"].as_str(), Some("udp://syslog:514"));
    }

    #[test]
    fn test_escape_and_lone_dollar() {
        let mut t = table(r#"v = "cost $5, literal $${HOME}""#);
        resolve_references(&mut t).unwrap();
        assert_eq!(t["v"].as_str(), Some("cost $5, literal ${HOME}"));
    }

    #[test]
    fn test_cycle_detected() {
        let mut t = table(
            r#"
            a = "${b}"
            b = "${a}"
            "#,
        );
        assert!(matches!(
            resolve_references(&mut t),
            Err(ConfigError::CircularReference)
        ));
    }

    #[test]
    fn test_errors() {
        let mut missing = table(r#"a = "${nope}""#);
        assert!(matches!(
            resolve_references(&mut missing),
            Err(ConfigError::ReferenceNotFound(_))
        ));

        let mut unclosed = table(r#"a = "${b""#);
        assert!(matches!(
            resolve_references(&mut unclosed),
            Err(ConfigError::UnclosedReference)
        ));

        let mut section = table("a = \"${s}\"\n[s]\nx = 1\n");
        assert!(matches!(
            resolve_references(&mut section),
            Err(ConfigError::NonScalarReference(_))
        ));

        let mut empty = table(r#"a = "${x..y}""#);
        assert!(matches!(
            resolve_references(&mut empty),
            Err(ConfigError::InvalidReferencePath(_))
        ));
    }

    #[test]
    fn test_escape_survives_later_passes() {
        let mut t = table(
            r#"
            a = "x"
            b = "${a}"
            c = "$${b} is ${b}"
            "#,
        );
        resolve_references(&mut t).unwrap();
        assert_eq!(t["c"].as_str(), Some("${b} is x"));
    }

    #[test]
    fn test_nested_tables_resolve_and_unescape() {
        let mut t = table(
            r#"
            root = "/srv"
            [file]
            path = "${root}/app.log"
            [file.extra]
            note = "$${root} stays"
            "#,
        );
        resolve_references(&mut t).unwrap();
        assert_eq!(t["file"]["path"].as_str(), Some("/srv/app.log"));
        assert_eq!(t["file"]["extra"]["note"].as_str(), Some("${root} stays"));
    }

    #[test]
    fn test_array_items() {
        let mut t = table(
            r#"
            base = "/api"
            routes = ["${base}/a", "${base}/b"]
            "#,
        );
        resolve_references(&mut t).unwrap();
        assert_eq!(t["routes"][1].as_str(), Some("/api/b"));
    }
}
