use toml::{Table, Value};

/// Merges every `{prefix}{separator}a{separator}b` variable into `table` at `a.b`.
pub(super) fn merge_vars<I>(table: &mut Table, prefix: &str, separator: &str, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    if separator.is_empty() {
        tracing::warn!(prefix, "empty separator, ignoring environment layer");
        return;
    }
    let lead = format!("{prefix}{separator}");

    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(&lead) else {
            continue;
        };
        let path: Vec<String> = rest.split(separator).map(str::to_lowercase).collect();
        if path.iter().any(String::is_empty) {
            tracing::debug!(var = %key, "ignoring variable with an empty path segment");
            continue;
        }
        insert_at(table, &path, coerce(&value));
    }
}

/// Sets `value` at `path`, creating or replacing intermediate tables.
fn insert_at(table: &mut Table, path: &[String], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };
    if rest.is_empty() {
        table.insert(head.clone(), value);
        return;
    }
    let slot = table
        .entry(head.clone())
        .or_insert_with(|| Value::Table(Table::new()));
    if !slot.is_table() {
        *slot = Value::Table(Table::new());
    }
    if let Value::Table(inner) = slot {
        insert_at(inner, rest, value);
    }
}

/// Interprets an environment string as the most specific TOML scalar.
fn coerce(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(i) = raw.parse() {
            return Value::Integer(i);
        }
    }
    if raw.contains('.') {
        if let Ok(f) = raw.parse() {
            return Value::Float(f);
        }
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_nested_paths_and_coercion() {
        let mut table = Table::new();
        merge_vars(
            &mut table,
            "LOG",
            "__",
            vars(&[
                ("LOG__FILE__LEVEL", "debug"),
                ("LOG__FILE__ENABLED", "FALSE"),
                ("LOG__CONSOLE__WIDTH", "-80"),
                ("LOG__RATIO", "0.5"),
                ("OTHER__FILE__LEVEL", "trace"),
            ]),
        );

        assert_eq!(table["file"]["level"].as_str(), Some("debug"));
        assert_eq!(table["file"]["enabled"].as_bool(), Some(false));
        assert_eq!(table["console"]["width"].as_integer(), Some(-80));
        assert_eq!(table["ratio"].as_float(), Some(0.5));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_scalar_replaced_by_table() {
        let mut table = Table::new();
        table.insert("file".into(), Value::String("x".into()));

        merge_vars(&mut table, "LOG", "__", vars(&[("LOG__FILE__PATH", "/tmp/a.log")]));

        assert_eq!(table["file"]["path"].as_str(), Some("/tmp/a.log"));
    }

    #[test]
    fn test_version_like_strings_stay_strings() {
        assert_eq!(coerce("1.2.3"), Value::String("1.2.3".into()));
        assert_eq!(coerce("-"), Value::String("-".into()));
        assert_eq!(coerce("42"), Value::Integer(42));
    }
}
