//! Error types for configuration loading and lookup

use std::path::PathBuf;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File that failed to open
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML/JSON, or its root is not a table
    #[error("failed to parse config from {origin}: {reason}")]
    Parse {
        /// Where the text came from (file path or `"<string>"`)
        origin: String,
        /// Parser message
        reason: String,
    },

    /// A mandatory key is absent or empty
    #[error("[{section}] missing required key `{key}`")]
    Missing {
        /// Section name
        section: String,
        /// Key inside the section
        key: String,
    },

    /// A key is present but cannot be read as the requested type
    #[error("[{section}] key `{key}` expected {expected}, found {found}")]
    Type {
        /// Section name
        section: String,
        /// Key inside the section
        key: String,
        /// Requested type
        expected: &'static str,
        /// What was actually there
        found: String,
    },
}

impl ConfigError {
    /// Create a missing-key error
    pub fn missing(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Missing {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Create a type error
    pub fn type_error(
        section: impl Into<String>,
        key: impl Into<String>,
        expected: &'static str,
        found: impl Into<String>,
    ) -> Self {
        Self::Type {
            section: section.into(),
            key: key.into(),
            expected,
            found: found.into(),
        }
    }

    pub(crate) fn parse(origin: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }
}
