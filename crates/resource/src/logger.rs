//! File-backed named loggers.
//!
//! `[log] path` is the directory for every logger; `<name>.path` overrides
//! it for one logger and `<name>.level` overrides the level the run mode
//! would pick. Logger `audit` writes to `<path>/audit.log`.

use std::path::{Path, PathBuf};

use strata_config::{Config, RunMode};
use strata_log::{LoggerBuilder, NamedLogger};

use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};
use crate::settings::Fields;

/// Validated logger fields
#[derive(Debug, Clone)]
pub struct LoggerSettings {
    /// Directory the log file lives in
    pub dir: PathBuf,
    /// Formatting and level, from the run-mode preset
    pub log: strata_log::Config,
}

/// Logging preset for a run mode.
pub fn preset_for(mode: RunMode) -> strata_log::Config {
    match mode {
        RunMode::Debug => strata_log::Config::development(),
        RunMode::Release => strata_log::Config::production(),
        RunMode::Test => strata_log::Config::test(),
    }
}

/// Builds [`NamedLogger`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggerResource;

impl Resource for LoggerResource {
    const KIND: ResourceKind = ResourceKind::Logger;
    type Settings = LoggerSettings;
    type Instance = NamedLogger;

    fn configure(&self, name: &str, config: &Config, _secrets: &Secrets) -> Result<LoggerSettings> {
        let fields = Fields::new(Self::KIND, name, config);

        let dir = match fields.optional_string("path")? {
            Some(dir) => dir,
            None => fields
                .shared_optional_string("path")?
                .ok_or_else(|| fields.missing("path"))?,
        };

        let mut log = preset_for(config.mode());
        if let Some(level) = fields.optional_string("level")? {
            log = log.with_level(level);
        }

        Ok(LoggerSettings {
            dir: PathBuf::from(dir),
            log,
        })
    }

    async fn create(&self, name: &str, settings: LoggerSettings) -> Result<NamedLogger> {
        LoggerBuilder::from_config(settings.log)
            .build_named(&settings.dir, name)
            .map_err(|e| Error::initialization(name, "could not create logger", e))
    }

    async fn probe(&self, name: &str, logger: &NamedLogger) -> Result<()> {
        let file = logger.file();
        if !file.is_file() {
            return Err(Error::Initialization {
                resource: name.to_string(),
                reason: format!("log file {} was not created", file.display()),
                source: None,
            });
        }

        let dir = file.parent().unwrap_or_else(|| Path::new("."));
        let writable = std::fs::metadata(dir)
            .map(|meta| meta.is_dir() && !meta.permissions().readonly())
            .unwrap_or(false);
        if !writable {
            return Err(Error::Initialization {
                resource: name.to_string(),
                reason: format!("log directory {} is not writable", dir.display()),
                source: None,
            });
        }
        Ok(())
    }
}
