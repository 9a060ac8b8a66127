//! Named, non-global loggers

use std::path::{Path, PathBuf};

use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;

/// A logger bound to one output file.
///
/// The logger is not installed globally; route events into it with
/// [`in_scope`](Self::in_scope) or by passing [`dispatch`](Self::dispatch)
/// to `tracing::dispatcher::with_default`. Dropping the logger flushes
/// buffered lines.
pub struct NamedLogger {
    name: String,
    file: PathBuf,
    level: String,
    dispatch: Dispatch,
    _guard: WorkerGuard,
}

impl NamedLogger {
    pub(crate) fn new(
        name: String,
        file: PathBuf,
        level: String,
        dispatch: Dispatch,
        guard: WorkerGuard,
    ) -> Self {
        Self {
            name,
            file,
            level,
            dispatch,
            _guard: guard,
        }
    }

    /// Logger name (also the file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File the logger appends to.
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Level filter the logger was built with.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// The subscriber behind this logger.
    pub fn dispatch(&self) -> &Dispatch {
        &self.dispatch
    }

    /// Run `f` with this logger as the thread's default subscriber.
    pub fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for NamedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedLogger")
            .field("name", &self.name)
            .field("file", &self.file)
            .field("level", &self.level)
            .finish_non_exhaustive()
    }
}
