//! Logging configuration
//!
//! - [`Config`]: level filter, format, writer and display toggles
//! - presets: `development`, `production`, `test`, `from_env`

mod presets;

use serde::{Deserialize, Serialize};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level filter (e.g. "info", "debug,sqlx=warn")
    pub level: String,

    /// Output format
    pub format: Format,

    /// Writer used by the process-wide subscriber
    pub writer: WriterConfig,

    /// Named loggers also copy every line to stdout
    pub tee_stdout: bool,

    /// Display configuration
    pub display: DisplayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: Format::Compact,
            writer: WriterConfig::Stderr,
            tee_stdout: false,
            display: DisplayConfig::default(),
        }
    }
}

impl Config {
    /// Replace the level filter.
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Human-readable multi-line output
    Pretty,
    /// Compact single-line output
    Compact,
    /// Structured JSON output, one object per line
    Json,
}

/// Writer for the process-wide subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriterConfig {
    /// Write to stderr
    #[default]
    Stderr,
    /// Write to stdout
    Stdout,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show source location (`file:line`)
    pub source: bool,
    /// Show target module
    pub target: bool,
    /// Use ANSI colors
    pub colors: bool,
    /// Flatten JSON events
    pub flatten: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            source: cfg!(debug_assertions),
            target: true,
            colors: false,
            flatten: true,
        }
    }
}

impl DisplayConfig {
    /// Parse display overrides from environment variables
    pub(super) fn parse_env(&mut self) {
        if let Ok(v) = std::env::var("STRATA_LOG_SOURCE") {
            self.source = v != "0" && v != "false";
        }
        if let Ok(v) = std::env::var("STRATA_LOG_COLORS") {
            self.colors = v != "0" && v != "false";
        }
    }
}
