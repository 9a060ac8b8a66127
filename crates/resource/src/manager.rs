//! Process-lifetime facade over one registry per resource kind.

use std::fmt;
use std::sync::Arc;

use strata_config::Config;
use strata_log::NamedLogger;

use crate::cache::{Cache, CacheResource};
use crate::credentials::Secrets;
use crate::database::trace::{LogSink, NullSink, TraceSink};
use crate::database::{Database, DatabaseResource};
use crate::error::Result;
use crate::logger::LoggerResource;
use crate::registry::{EntryState, Registry};
use crate::resource::{ResourceKind, build, build_configured};
use crate::storage::{ObjectStore, StorageResource};

/// Owns the loaded configuration and hands out shared named resources.
///
/// Each accessor builds the resource on first use (configure, create,
/// probe) and returns the same `Arc` to every later caller. Construction
/// failures are returned as-is and leave the name unbuilt.
///
/// ```no_run
/// # async fn run() -> strata_resource::Result<()> {
/// let config = strata_config::Config::from_file("service.toml").expect("config");
/// let manager = strata_resource::Manager::new(config)?;
///
/// let sessions = manager.cache("session").await?;
/// let pong: String = sessions.query(&redis::cmd("PING")).await?;
/// # let _ = pong;
/// # Ok(())
/// # }
/// ```
pub struct Manager {
    config: Config,
    secrets: Secrets,
    databases: Registry<Database>,
    caches: Registry<Cache>,
    stores: Registry<ObjectStore>,
    loggers: Registry<NamedLogger>,
}

impl Manager {
    /// Create a manager, reading the credential key from `[security]` or
    /// the environment.
    pub fn new(config: Config) -> Result<Self> {
        let secrets = Secrets::from_config(&config)?;
        Ok(Self::with_secrets(config, secrets))
    }

    /// Create a manager with an explicit credential decryptor.
    #[must_use]
    pub fn with_secrets(config: Config, secrets: Secrets) -> Self {
        Self {
            config,
            secrets,
            databases: Registry::new("database"),
            caches: Registry::new("cache"),
            stores: Registry::new("storage"),
            loggers: Registry::new("logger"),
        }
    }

    /// Loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Credential decryptor
    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    /// Database handle named `name`.
    ///
    /// Statements run through it are traced to the `<app_name>-sql` logger
    /// unless `[database] log.mode` is `false`. That logger is built only
    /// once the database's own fields validate.
    pub async fn database(&self, name: &str) -> Result<Arc<Database>> {
        self.databases
            .get(name, |name| async move {
                let settings = DatabaseResource::settings(&name, &self.config, &self.secrets)?;
                let sink: Arc<dyn TraceSink> = if settings.trace {
                    Arc::new(LogSink::new(self.logger(&self.sql_logger_name()).await?))
                } else {
                    Arc::new(NullSink)
                };
                build_configured(&DatabaseResource::new(sink), &name, settings).await
            })
            .await
    }

    /// Cache client named `name`.
    pub async fn cache(&self, name: &str) -> Result<Arc<Cache>> {
        self.caches
            .get(name, |name| async move {
                build(&CacheResource, &name, &self.config, &self.secrets).await
            })
            .await
    }

    /// Object-storage client named `name`.
    pub async fn object_store(&self, name: &str) -> Result<Arc<ObjectStore>> {
        self.stores
            .get(name, |name| async move {
                build(&StorageResource, &name, &self.config, &self.secrets).await
            })
            .await
    }

    /// File logger named `name`.
    pub async fn logger(&self, name: &str) -> Result<Arc<NamedLogger>> {
        self.loggers
            .get(name, |name| async move {
                build(&LoggerResource, &name, &self.config, &self.secrets).await
            })
            .await
    }

    /// Build state of `name` in the registry for `kind`.
    pub fn state(&self, kind: ResourceKind, name: &str) -> EntryState {
        match kind {
            ResourceKind::Database => self.databases.state(name),
            ResourceKind::Cache => self.caches.state(name),
            ResourceKind::ObjectStorage => self.stores.state(name),
            ResourceKind::Logger => self.loggers.state(name),
        }
    }

    /// Names already built for `kind`, sorted.
    pub fn ready(&self, kind: ResourceKind) -> Vec<String> {
        match kind {
            ResourceKind::Database => self.databases.names(),
            ResourceKind::Cache => self.caches.names(),
            ResourceKind::ObjectStorage => self.stores.names(),
            ResourceKind::Logger => self.loggers.names(),
        }
    }

    fn sql_logger_name(&self) -> String {
        format!("{}-sql", self.config.app_name())
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("secrets", &self.secrets)
            .field("databases", &self.databases)
            .field("caches", &self.caches)
            .field("stores", &self.stores)
            .field("loggers", &self.loggers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pretty_assertions::assert_eq;

    fn manager(toml: &str) -> Manager {
        Manager::with_secrets(Config::from_toml_str(toml).unwrap(), Secrets::none())
    }

    #[test]
    fn sql_logger_follows_app_name() {
        assert_eq!(manager("").sql_logger_name(), "app-sql");
        assert_eq!(manager("app_name = \"orders\"").sql_logger_name(), "orders-sql");
    }

    #[tokio::test]
    async fn database_fields_are_validated_before_the_sql_logger() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&format!(
            r#"
            [log]
            path = '{}'

            [database.main]
            driver = "mysql"
            port = 3306
            username = "u"
            password = "p"
            db = "d"
            "#,
            dir.path().display()
        ));

        let err = manager.database("main").await.unwrap_err();
        assert!(
            matches!(err, Error::ConfigMissing { ref section, ref field, .. }
                if section == "database" && field == "host"),
            "got {err:?}"
        );
        assert_eq!(manager.state(ResourceKind::Database, "main"), EntryState::Absent);
        assert_eq!(manager.state(ResourceKind::Logger, "app-sql"), EntryState::Absent);
        assert!(!dir.path().join("app-sql.log").exists());
    }

    #[tokio::test]
    async fn database_without_log_path_fails_before_connecting() {
        let manager = manager(
            r#"
            [database.main]
            driver = "mysql"
            host = "h"
            port = 3306
            username = "u"
            password = "p"
            db = "d"
            "#,
        );

        let err = manager.database("main").await.unwrap_err();
        assert!(
            matches!(err, Error::ConfigMissing { ref section, ref field, .. }
                if section == "log" && field == "path"),
            "got {err:?}"
        );
        assert_eq!(manager.state(ResourceKind::Database, "main"), EntryState::Absent);
        assert_eq!(manager.state(ResourceKind::Logger, "app-sql"), EntryState::Absent);
    }

    #[tokio::test]
    async fn database_with_log_mode_off_skips_the_sql_logger() {
        let manager = manager(
            r#"
            [database]
            "log.mode" = false

            [database.main]
            driver = "postgresql"
            host = "127.0.0.1"
            port = 1
            username = "u"
            password = "p"
            db = "d"
            dial_timeout_ms = 200
            "#,
        );

        let err = manager.database("main").await.unwrap_err();
        assert!(matches!(err, Error::Connectivity { .. }), "got {err:?}");
        assert_eq!(manager.state(ResourceKind::Logger, "app-sql"), EntryState::Absent);
    }
}
