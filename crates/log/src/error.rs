//! Error type for logger construction

use std::path::PathBuf;

/// Result type for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while building a logger
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LogError {
    /// The level/filter directive could not be parsed
    #[error("Invalid filter '{filter}': {reason}")]
    Filter {
        /// The offending directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// Log directory could not be created or is not usable
    #[error("Log directory '{}' is not usable: {source}", path.display())]
    Directory {
        /// Directory path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// File writer could not be opened
    #[error("Writer for '{}' failed: {reason}", path.display())]
    Writer {
        /// Target file path
        path: PathBuf,
        /// Failure reason
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("A global logger is already installed")]
    AlreadyInitialized,
}
