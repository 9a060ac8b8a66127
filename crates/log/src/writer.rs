//! Writer implementations

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

use crate::config::WriterConfig;
use crate::error::{LogError, LogResult};

/// Create the non-blocking console writer for the process-wide subscriber.
pub(crate) fn make_console_writer(config: WriterConfig) -> (BoxMakeWriter, WorkerGuard) {
    let (non_blocking, guard) = match config {
        WriterConfig::Stderr => tracing_appender::non_blocking(io::stderr()),
        WriterConfig::Stdout => tracing_appender::non_blocking(io::stdout()),
    };
    (BoxMakeWriter::new(non_blocking), guard)
}

/// File path a named logger writes to.
pub(crate) fn log_file_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.log"))
}

/// Create a non-blocking writer appending to `<dir>/<name>.log`.
///
/// The directory is created when missing. The returned guard flushes
/// pending lines when dropped.
pub(crate) fn make_file_writer(
    dir: &Path,
    name: &str,
    tee_stdout: bool,
) -> LogResult<(BoxMakeWriter, WorkerGuard)> {
    std::fs::create_dir_all(dir).map_err(|source| LogError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| LogError::Writer {
            path: log_file_path(dir, name),
            reason: e.to_string(),
        })?;

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let writer = if tee_stdout {
        BoxMakeWriter::new(non_blocking.and(io::stdout))
    } else {
        BoxMakeWriter::new(non_blocking)
    };

    Ok((writer, guard))
}
