//! Configuration container and loaders

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::section::Section;

/// Default for the root `app_name` key.
const DEFAULT_APP_NAME: &str = "app";

/// Process run mode, read from the root `mode` key.
///
/// Selects logger presets: `Debug` logs verbosely to the console and file,
/// `Release` logs JSON at info level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunMode {
    /// Development: debug level, pretty output teed to stdout
    Debug,
    /// Production: info level, JSON
    #[default]
    Release,
    /// Tests: like `Debug` without the stdout copy
    Test,
}

impl RunMode {
    /// Lowercase name as written in config files
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "release" => Ok(Self::Release),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown run mode '{other}'")),
        }
    }
}

/// Loaded configuration.
///
/// Immutable after load and cheap to clone; sections share the same
/// document.
#[derive(Clone)]
pub struct Config {
    root: Arc<Value>,
}

impl Config {
    /// Load from a file. `.json` files are parsed as JSON, anything else as
    /// TOML.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let origin = path.display().to_string();
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let root = if is_json {
            serde_json::from_str(&text).map_err(|e| ConfigError::parse(&origin, e))?
        } else {
            parse_toml(&origin, &text)?
        };

        let config = Self::from_value_with_origin(root, &origin)?;
        strata_log::debug!(
            path = %origin,
            sections = config.section_names().len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let root = parse_toml("<string>", text)?;
        Self::from_value_with_origin(root, "<string>")
    }

    /// Wrap an already-parsed document. The root must be an object.
    pub fn from_value(root: Value) -> ConfigResult<Self> {
        Self::from_value_with_origin(root, "<value>")
    }

    fn from_value_with_origin(root: Value, origin: &str) -> ConfigResult<Self> {
        if !root.is_object() {
            return Err(ConfigError::parse(origin, "document root must be a table"));
        }
        Ok(Self {
            root: Arc::new(root),
        })
    }

    /// Section by name. An absent section behaves as an empty one, so every
    /// mandatory lookup inside it reports [`ConfigError::Missing`].
    pub fn section(&self, name: &str) -> Section {
        Section::new(name, Arc::clone(&self.root))
    }

    /// Names of the top-level tables.
    pub fn section_names(&self) -> Vec<String> {
        self.root
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, _)| k.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Run mode from the root `mode` key; `Release` when absent.
    ///
    /// An unrecognized value is reported and treated as `Release`.
    pub fn mode(&self) -> RunMode {
        let Some(raw) = self.root.get("mode").and_then(Value::as_str) else {
            return RunMode::default();
        };
        raw.parse().unwrap_or_else(|reason: String| {
            strata_log::warn!(%reason, "falling back to release mode");
            RunMode::default()
        })
    }

    /// Application name from the root `app_name` key; `"app"` when absent.
    pub fn app_name(&self) -> &str {
        self.root
            .get("app_name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_APP_NAME)
    }

    /// The whole document.
    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Values may hold credentials; show the shape only.
        f.debug_struct("Config")
            .field("sections", &self.section_names())
            .field("mode", &self.mode())
            .finish()
    }
}

fn parse_toml(origin: &str, text: &str) -> ConfigResult<Value> {
    toml::from_str::<Value>(text).map_err(|e| ConfigError::parse(origin, e))
}
