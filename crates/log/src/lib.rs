//! # Strata Log
//!
//! Structured logging for services bootstrapped by strata.
//!
//! Two entry points:
//! - [`init_with`] installs the process-wide subscriber (console output).
//! - [`LoggerBuilder::build_named`] builds a non-global [`NamedLogger`] that
//!   writes to `<dir>/<name>.log`. Named loggers are what the resource
//!   registry hands out.
//!
//! ```no_run
//! use strata_log::{Config, LoggerBuilder};
//!
//! # fn main() -> strata_log::LogResult<()> {
//! let _guard = strata_log::init_with(Config::from_env())?;
//! strata_log::info!(port = 8080, "service starting");
//!
//! let audit = LoggerBuilder::from_config(Config::production())
//!     .build_named("/var/log/app".as_ref(), "audit")?;
//! audit.in_scope(|| strata_log::info!(user = "42", "login"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod builder;
mod config;
mod error;
mod format;
mod named;
mod writer;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format, WriterConfig};
pub use error::{LogError, LogResult};
pub use format::TIMESTAMP_FORMAT;
pub use named::NamedLogger;

// Re-export tracing macros so dependents log through one crate
pub use tracing::{Level as TracingLevel, debug, error, info, instrument, span, trace, warn};

/// Install the process-wide subscriber built from `config`.
///
/// Fails with [`LogError::AlreadyInitialized`] when a global subscriber is
/// already set.
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}

/// Install the process-wide subscriber from `STRATA_LOG` / `RUST_LOG`.
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}
