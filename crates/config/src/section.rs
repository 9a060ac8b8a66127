//! Typed access to one configuration section

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

/// Read-only view of one top-level table.
///
/// Keys are looked up verbatim first (`"primary.host"` as a single key),
/// then as a dotted path (`[section.primary] host = ...`). Cloning is
/// cheap.
#[derive(Clone)]
pub struct Section {
    name: Arc<str>,
    root: Arc<Value>,
}

impl Section {
    pub(crate) fn new(name: &str, root: Arc<Value>) -> Self {
        Self {
            name: Arc::from(name),
            root,
        }
    }

    /// Section name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the section exists in the document at all.
    pub fn exists(&self) -> bool {
        self.table().is_some()
    }

    /// Whether `key` is present (any value, including an empty string).
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Mandatory string. Numbers and booleans are accepted in their
    /// canonical text form.
    pub fn string(&self, key: &str) -> ConfigResult<String> {
        self.optional_string(key)?
            .ok_or_else(|| ConfigError::missing(self.name(), key))
    }

    /// Optional string with a default for absent or empty values.
    pub fn string_or(&self, key: &str, default: impl Into<String>) -> ConfigResult<String> {
        Ok(self
            .optional_string(key)?
            .unwrap_or_else(|| default.into()))
    }

    /// Optional string, `None` when absent or empty.
    pub fn optional_string(&self, key: &str) -> ConfigResult<Option<String>> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        match value {
            Value::String(s) => Ok(Some(s.clone())),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(self.type_error(key, "string", other)),
        }
    }

    /// Mandatory integer. Strings of digits are accepted.
    pub fn int(&self, key: &str) -> ConfigResult<i64> {
        self.optional_int(key)?
            .ok_or_else(|| ConfigError::missing(self.name(), key))
    }

    /// Optional integer with a default for absent or empty values.
    pub fn int_or(&self, key: &str, default: i64) -> ConfigResult<i64> {
        Ok(self.optional_int(key)?.unwrap_or(default))
    }

    /// Optional integer, `None` when absent or empty.
    pub fn optional_int(&self, key: &str) -> ConfigResult<Option<i64>> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.type_error(key, "integer", value))
    }

    /// Mandatory boolean. Accepts `true/false/yes/no/on/off/1/0`.
    pub fn bool(&self, key: &str) -> ConfigResult<bool> {
        self.optional_bool(key)?
            .ok_or_else(|| ConfigError::missing(self.name(), key))
    }

    /// Optional boolean with a default for absent or empty values.
    pub fn bool_or(&self, key: &str, default: bool) -> ConfigResult<bool> {
        Ok(self.optional_bool(key)?.unwrap_or(default))
    }

    /// Optional boolean, `None` when absent or empty.
    pub fn optional_bool(&self, key: &str) -> ConfigResult<Option<bool>> {
        let Some(value) = self.present(key) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => parse_bool(s),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| self.type_error(key, "boolean", value))
    }

    fn table(&self) -> Option<&serde_json::Map<String, Value>> {
        self.root.get(&*self.name).and_then(Value::as_object)
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let table = self.table()?;
        if let Some(value) = table.get(key) {
            return Some(value);
        }

        let mut parts = key.split('.');
        let mut current = table.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Value for `key`, treating null and the empty string as absent.
    fn present(&self, key: &str) -> Option<&Value> {
        match self.lookup(key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            value => Some(value),
        }
    }

    fn type_error(&self, key: &str, expected: &'static str, found: &Value) -> ConfigError {
        ConfigError::type_error(self.name(), key, expected, describe(found))
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self
            .table()
            .map(|t| t.keys().map(String::as_str).collect())
            .unwrap_or_default();
        f.debug_struct("Section")
            .field("name", &self.name)
            .field("keys", &keys)
            .finish()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "table".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn section(toml: &str, name: &str) -> Section {
        crate::Config::from_toml_str(toml).unwrap().section(name)
    }

    #[rstest]
    #[case("yes", true)]
    #[case("On", true)]
    #[case("1", true)]
    #[case("false", false)]
    #[case("off", false)]
    #[case("0", false)]
    fn bool_accepts_common_spellings(#[case] raw: &str, #[case] expected: bool) {
        let s = section(&format!("[s]\nflag = \"{raw}\""), "s");
        assert_eq!(s.bool("flag").unwrap(), expected);
    }

    #[test]
    fn empty_string_counts_as_missing() {
        let s = section("[redis]\n\"c.host\" = \"\"", "redis");
        assert!(s.has("c.host"));
        let err = s.string("c.host").unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref key, .. } if key == "c.host"));
        assert_eq!(s.string_or("c.host", "fallback").unwrap(), "fallback");
    }

    #[test]
    fn digit_strings_read_as_integers() {
        let s = section("[s]\nport = \" 5432 \"", "s");
        assert_eq!(s.int("port").unwrap(), 5432);
    }

    #[test]
    fn non_numeric_integer_is_a_type_error() {
        let s = section("[s]\nmax_open = \"many\"", "s");
        let err = s.int_or("max_open", 20).unwrap_err();
        match err {
            ConfigError::Type {
                key,
                expected,
                found,
                ..
            } => {
                assert_eq!(key, "max_open");
                assert_eq!(expected, "integer");
                assert_eq!(found, "string \"many\"");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn numbers_read_as_strings() {
        let s = section("[s]\npassword = 12345", "s");
        assert_eq!(s.string("password").unwrap(), "12345");
    }

    #[test]
    fn absent_section_is_empty() {
        let s = section("[other]\nx = 1", "missing");
        assert!(!s.exists());
        assert!(!s.has("x"));
        assert_eq!(s.int_or("x", 7).unwrap(), 7);
        assert!(matches!(
            s.int("x").unwrap_err(),
            ConfigError::Missing { ref section, .. } if section == "missing"
        ));
    }
}
