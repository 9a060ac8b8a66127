//! Logger builder implementation
//!
//! This module is organized into:
//! - `format`: Format layer creation macros (reduces duplication)
//! - this file: subscriber assembly for the global and named loggers

#[macro_use]
mod format;

use std::path::Path;

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

use crate::config::{Config, Format};
use crate::error::{LogError, LogResult};
use crate::named::NamedLogger;
use crate::writer;

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Guard that keeps the process-wide logger alive
///
/// Holding the guard keeps the background writer running; drop it at the
/// end of `main` to flush.
#[derive(Debug)]
pub struct LoggerGuard {
    _writer_guard: WorkerGuard,
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// The configuration this builder was created from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build and install the process-wide subscriber
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Filter string cannot be parsed
    /// - A global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let (writer, guard) = writer::make_console_writer(self.config.writer);
        let dispatch = make_dispatch(&self.config, writer)?;

        tracing::dispatcher::set_global_default(dispatch)
            .map_err(|_| LogError::AlreadyInitialized)?;

        Ok(LoggerGuard {
            _writer_guard: guard,
        })
    }

    /// Build a logger that writes to `<dir>/<name>.log` without touching
    /// the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created, the file cannot be
    /// opened, or the filter string cannot be parsed.
    pub fn build_named(self, dir: &Path, name: &str) -> LogResult<NamedLogger> {
        let (writer, guard) = writer::make_file_writer(dir, name, self.config.tee_stdout)?;
        let dispatch = make_dispatch(&self.config, writer)?;

        Ok(NamedLogger::new(
            name.to_string(),
            writer::log_file_path(dir, name),
            self.config.level.clone(),
            dispatch,
            guard,
        ))
    }
}

/// Assemble `Registry + filter + fmt layer` for the configured format.
fn make_dispatch(config: &Config, writer: BoxMakeWriter) -> LogResult<Dispatch> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| LogError::Filter {
        filter: config.level.clone(),
        reason: e.to_string(),
    })?;

    let dispatch = match config.format {
        Format::Pretty => {
            let fmt_layer = create_fmt_layer!(pretty, &config.display, writer);
            Dispatch::new(Registry::default().with(filter).with(fmt_layer))
        }
        Format::Compact => {
            let fmt_layer = create_fmt_layer!(compact, &config.display, writer);
            Dispatch::new(Registry::default().with(filter).with(fmt_layer))
        }
        Format::Json => {
            let fmt_layer = create_json_layer!(&config.display, writer);
            Dispatch::new(Registry::default().with(filter).with(fmt_layer))
        }
    };

    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_rejected() {
        let config = Config::default().with_level("strata=loud");
        let dir = tempfile::tempdir().unwrap();

        let err = LoggerBuilder::from_config(config)
            .build_named(dir.path(), "broken")
            .unwrap_err();
        assert!(matches!(err, LogError::Filter { .. }), "got {err:?}");
    }

    #[test]
    fn named_logger_creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("logs");

        let logger = LoggerBuilder::from_config(Config::test())
            .build_named(&dir, "app")
            .unwrap();

        assert!(dir.is_dir());
        assert_eq!(logger.file(), dir.join("app.log"));
    }
}
