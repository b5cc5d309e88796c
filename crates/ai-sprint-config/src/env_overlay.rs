// crates/ai-sprint-config/src/env_overlay.rs
// ============================================================================
// Module: Environment Overlay
// Description: Applies AI_SPRINT_-prefixed environment variables on top of a
//              parsed TOML table before deserialization.
// Purpose: Mirror the source's env_prefix/env_nested_delimiter overlay so a
//          deployment can override individual keys without a config file.
// Dependencies: toml
// ============================================================================

//! ## Overview
//! Each environment variable `AI_SPRINT_SECTION__KEY` (optionally with more
//! `__`-delimited segments for nested maps, e.g. `models.<role>`) is lower-
//! cased and walked into the table as a path, overwriting whatever the file
//! supplied. Values are coerced to bool/integer/float when they parse as
//! such, falling back to a string, so a parsed value can land on a typed
//! field without the caller needing to know its type in advance.

use toml::Value;
use toml::value::Table;

/// Prefix every recognized environment variable carries.
const ENV_PREFIX: &str = "AI_SPRINT_";
/// Delimiter separating nested path segments within one variable name.
const ENV_NESTED_DELIMITER: &str = "__";

/// Applies every `AI_SPRINT_`-prefixed variable in `vars` onto `base`,
/// returning the merged table.
pub(crate) fn apply_env_overlay(mut base: Table, vars: impl Iterator<Item = (String, String)>) -> Table {
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let segments: Vec<String> =
            path.split(ENV_NESTED_DELIMITER).map(|segment| segment.to_ascii_lowercase()).collect();
        if segments.iter().any(String::is_empty) {
            continue;
        }
        set_path(&mut base, &segments, coerce(&value));
    }
    base
}

/// Sets `value` at the nested `path` within `table`, creating intermediate
/// tables as needed.
fn set_path(table: &mut Table, path: &[String], value: Value) {
    let [head, rest @ ..] = path else { return };
    if rest.is_empty() {
        table.insert(head.clone(), value);
        return;
    }
    let entry = table.entry(head.clone()).or_insert_with(|| Value::Table(Table::new()));
    if !entry.is_table() {
        *entry = Value::Table(Table::new());
    }
    let Value::Table(nested) = entry else {
        unreachable!("just normalized to a table");
    };
    set_path(nested, rest, value);
}

/// Coerces a raw environment-variable string into the most specific `toml`
/// value it parses as: bool, then integer, then float, else string.
fn coerce(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(parsed) = raw.parse::<i64>() {
        return Value::Integer(parsed);
    }
    if let Ok(parsed) = raw.parse::<f64>() {
        return Value::Float(parsed);
    }
    Value::String(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_key_overrides_a_parsed_table() {
        let mut base = Table::new();
        let mut agents = Table::new();
        agents.insert("max_developers".to_string(), Value::Integer(3));
        base.insert("agents".to_string(), Value::Table(agents));

        let merged = apply_env_overlay(
            base,
            [("AI_SPRINT_AGENTS__MAX_DEVELOPERS".to_string(), "7".to_string())].into_iter(),
        );

        let value = merged["agents"]["max_developers"].as_integer();
        assert_eq!(value, Some(7));
    }

    #[test]
    fn unprefixed_variables_are_ignored() {
        let merged =
            apply_env_overlay(Table::new(), [("PATH".to_string(), "/bin".to_string())].into_iter());
        assert!(merged.is_empty());
    }

    #[test]
    fn triple_delimiter_reaches_a_model_role() {
        let merged = apply_env_overlay(
            Table::new(),
            [("AI_SPRINT_MODELS__DEVELOPER".to_string(), "opus".to_string())].into_iter(),
        );
        assert_eq!(merged["models"]["developer"].as_str(), Some("opus"));
    }
}
