//! Error types for resource construction and use
use thiserror::Error;

use crate::resource::ResourceKind;

/// Result type for resource operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source error
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for resource construction and use.
///
/// The first five variants are raised while a resource is being built and
/// are fatal: the registry never retries them and the name stays absent.
/// The rest come from using a resource after it is ready.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A mandatory field is absent (or empty) in the resource's section
    #[error("resource '{resource}': missing field '{field}' in [{section}]")]
    ConfigMissing {
        /// The resource name
        resource: String,
        /// The config section
        section: String,
        /// The field, without the `<name>.` prefix
        field: String,
    },

    /// A field is present but has the wrong type or an invalid value
    #[error(
        "resource '{resource}': field '{field}' in [{section}] expected {expected}, found {found}"
    )]
    ConfigType {
        /// The resource name
        resource: String,
        /// The config section
        section: String,
        /// The field, without the `<name>.` prefix
        field: String,
        /// What was expected
        expected: &'static str,
        /// What was found
        found: String,
    },

    /// The backend could not be reached or failed its liveness probe
    #[error("resource '{resource}' is unreachable: {reason}")]
    Connectivity {
        /// The resource name
        resource: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// The configured driver is not supported for this kind
    #[error("resource '{resource}': unsupported {kind} driver '{driver}'")]
    UnsupportedKind {
        /// The resource name
        resource: String,
        /// The resource kind
        kind: ResourceKind,
        /// The configured driver
        driver: String,
    },

    /// The client could not be built (bad URL, log file not creatable, ...)
    #[error("initialization failed for resource '{resource}': {reason}")]
    Initialization {
        /// The resource name
        resource: String,
        /// The failure reason
        reason: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },

    /// A statement failed
    #[error("query failed on database '{resource}': {source}")]
    Query {
        /// The resource name
        resource: String,
        /// The driver error
        #[source]
        source: sqlx::Error,
    },

    /// No connection became available within the acquire timeout
    #[error("pool exhausted for '{resource}': {max_open} connections in use, waited {waited_ms}ms")]
    PoolExhausted {
        /// The resource name
        resource: String,
        /// The open-connection bound
        max_open: usize,
        /// How long the caller waited
        waited_ms: u64,
    },

    /// An operation exceeded its deadline
    #[error("operation '{operation}' timed out after {timeout_ms}ms for resource '{resource}'")]
    Timeout {
        /// The resource name
        resource: String,
        /// The operation that timed out
        operation: &'static str,
        /// The deadline in milliseconds
        timeout_ms: u64,
    },

    /// Any other failure while using a ready resource
    #[error("internal error in resource '{resource}': {message}")]
    Internal {
        /// The resource name
        resource: String,
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<BoxError>,
    },
}

impl Error {
    /// Create a connectivity error with an underlying cause
    pub fn connectivity(
        resource: impl Into<String>,
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Connectivity {
            resource: resource.into(),
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Create an initialization error with an underlying cause
    pub fn initialization(
        resource: impl Into<String>,
        reason: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Initialization {
            resource: resource.into(),
            reason: reason.into(),
            source: Some(source.into()),
        }
    }

    /// Create an internal error with an underlying cause
    pub fn internal(
        resource: impl Into<String>,
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Internal {
            resource: resource.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a timeout error
    pub fn timeout(
        resource: impl Into<String>,
        operation: &'static str,
        timeout: std::time::Duration,
    ) -> Self {
        Self::Timeout {
            resource: resource.into(),
            operation,
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Check if this error aborts resource construction.
    ///
    /// Fatal errors are never retried by the registry; startup code is
    /// expected to stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigMissing { .. }
                | Self::ConfigType { .. }
                | Self::Connectivity { .. }
                | Self::UnsupportedKind { .. }
                | Self::Initialization { .. }
        )
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. } | Self::Timeout { .. })
    }

    /// Get the resource name associated with this error
    #[must_use]
    pub fn resource(&self) -> &str {
        match self {
            Self::ConfigMissing { resource, .. }
            | Self::ConfigType { resource, .. }
            | Self::Connectivity { resource, .. }
            | Self::UnsupportedKind { resource, .. }
            | Self::Initialization { resource, .. }
            | Self::Query { resource, .. }
            | Self::PoolExhausted { resource, .. }
            | Self::Timeout { resource, .. }
            | Self::Internal { resource, .. } => resource,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_are_fatal_and_not_retryable() {
        let err = Error::ConfigMissing {
            resource: "primary".into(),
            section: "database".into(),
            field: "host".into(),
        };
        assert!(err.is_fatal());
        assert!(!err.is_retryable());
        assert_eq!(err.resource(), "primary");
        assert_eq!(
            err.to_string(),
            "resource 'primary': missing field 'host' in [database]"
        );
    }

    #[test]
    fn pool_errors_are_retryable() {
        let err = Error::timeout("cache", "acquire", std::time::Duration::from_millis(250));
        assert!(err.is_retryable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("250ms"));
    }
}
