//! Relational database handles.
//!
//! Fields under `[database]`, each prefixed with the resource name:
//!
//! | field | required | default |
//! |---|---|---|
//! | `driver` | yes | `mysql` or `postgresql` |
//! | `host`, `port`, `username`, `password`, `db` | yes | |
//! | `charset` | no | `utf8` (MySQL) |
//! | `sslmode` | no | `disable` (PostgreSQL) |
//! | `max_open` | no | 2 × CPUs + 1 |
//! | `max_idle` | no | CPUs + 1, clamped to `max_open` |
//! | `dial_timeout_ms` | no | 15000 |
//! | `idle_timeout_secs` | no | 180 |
//!
//! The section-wide `log.mode` flag (default `true`) turns statement tracing
//! off for every database when set to `false`.
//!
//! Connections are recycled after two hours regardless of use. The sqlx
//! pool has no idle ceiling and keeps no connections open as a floor:
//! `max_idle` is validated and logged, while `idle_timeout_secs` is what
//! closes idle connections.

pub mod trace;
mod value;

use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::sync::{Arc, Once};
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use sqlx::Connection;
use sqlx::AnyPool;
use sqlx::any::{AnyPoolOptions, AnyRow};
use strata_config::Config;
use url::Url;

use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::resource::{Resource, ResourceKind};
use crate::settings::{Fields, cpu_count};
use trace::{TraceEvent, TraceSink};

pub use value::Value;

/// Connection lifetime cap.
pub const MAX_LIFETIME: Duration = Duration::from_secs(2 * 60 * 60);

const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(180);

static INSTALL_DRIVERS: Once = Once::new();

/// Supported database drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// MySQL / MariaDB
    MySql,
    /// PostgreSQL
    Postgres,
}

impl Driver {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mysql" => Some(Self::MySql),
            "postgresql" | "postgres" => Some(Self::Postgres),
            _ => None,
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }
}

/// Validated database fields
pub struct DatabaseSettings {
    /// Driver
    pub driver: Driver,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login user
    pub username: String,
    /// Login password
    pub password: SecretString,
    /// Database name
    pub db: String,
    /// Client charset (MySQL)
    pub charset: String,
    /// TLS mode (PostgreSQL)
    pub sslmode: String,
    /// Open-connection bound
    pub max_open: u32,
    /// Trace statements (`[database] log.mode`)
    pub trace: bool,
    /// Idle-connection bound as configured. sqlx has no idle ceiling, so
    /// this is reported but idle connections are closed by `idle_timeout`.
    pub max_idle: u32,
    /// Connect and acquire deadline
    pub dial_timeout: Duration,
    /// Idle connections are closed after this long
    pub idle_timeout: Duration,
}

impl DatabaseSettings {
    /// Connection URL, including the password.
    fn url(&self, resource: &str) -> Result<Url> {
        let mut url = self.url_without_password(resource)?;
        url.set_password(Some(self.password.expose_secret()))
            .map_err(|()| invalid_url(resource))?;
        Ok(url)
    }

    /// Connection URL safe to log.
    fn url_without_password(&self, resource: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}://localhost/", self.driver.scheme()))
            .map_err(|e| Error::initialization(resource, "invalid connection URL", e))?;
        url.set_host(Some(&self.host)).map_err(|e| Error::ConfigType {
            resource: resource.to_string(),
            section: ResourceKind::Database.section().to_string(),
            field: "host".to_string(),
            expected: "hostname",
            found: format!("{:?} ({e})", self.host),
        })?;
        url.set_port(Some(self.port))
            .map_err(|()| invalid_url(resource))?;
        url.set_username(&self.username)
            .map_err(|()| invalid_url(resource))?;
        url.set_path(&self.db);
        {
            let mut query = url.query_pairs_mut();
            match self.driver {
                Driver::MySql => query.append_pair("charset", &self.charset),
                Driver::Postgres => query.append_pair("sslmode", &self.sslmode),
            };
        }
        Ok(url)
    }
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("db", &self.db)
            .field("max_open", &self.max_open)
            .field("max_idle", &self.max_idle)
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

fn invalid_url(resource: &str) -> Error {
    Error::Initialization {
        resource: resource.to_string(),
        reason: "could not build connection URL".to_string(),
        source: None,
    }
}

/// Builds [`Database`] handles.
pub struct DatabaseResource {
    sink: Arc<dyn TraceSink>,
}

impl DatabaseResource {
    /// Factory whose handles report every statement to `sink`.
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self { sink }
    }

    /// Validate `<name>.*` fields and apply defaults. Needs no sink, so
    /// callers can validate before deciding where statements are traced.
    pub fn settings(name: &str, config: &Config, secrets: &Secrets) -> Result<DatabaseSettings> {
        let fields = Fields::new(ResourceKind::Database, name, config);

        let raw_driver = fields.string("driver")?;
        let driver = Driver::parse(&raw_driver).ok_or_else(|| Error::UnsupportedKind {
            resource: name.to_string(),
            kind: ResourceKind::Database,
            driver: raw_driver.clone(),
        })?;

        let cpus = cpu_count();
        let max_open = fields.count_or("max_open", cpus * 2 + 1)?;
        let max_idle = fields.count_or("max_idle", cpus + 1)?.min(max_open);

        Ok(DatabaseSettings {
            driver,
            host: fields.string("host")?,
            port: fields.port("port")?,
            username: fields.string("username")?,
            password: fields.secret("password", secrets)?,
            db: fields.string("db")?,
            charset: fields.string_or("charset", "utf8")?,
            sslmode: fields.string_or("sslmode", "disable")?,
            max_open: u32::try_from(max_open).unwrap_or(u32::MAX),
            max_idle: u32::try_from(max_idle).unwrap_or(u32::MAX),
            trace: fields.shared_bool_or("log.mode", true)?,
            dial_timeout: fields.duration_or(
                "dial_timeout_ms",
                DEFAULT_DIAL_TIMEOUT,
                Duration::from_millis(1),
            )?,
            idle_timeout: fields.duration_or(
                "idle_timeout_secs",
                DEFAULT_IDLE_TIMEOUT,
                Duration::from_secs(1),
            )?,
        })
    }
}

impl Resource for DatabaseResource {
    const KIND: ResourceKind = ResourceKind::Database;
    type Settings = DatabaseSettings;
    type Instance = Database;

    fn configure(
        &self,
        name: &str,
        config: &Config,
        secrets: &Secrets,
    ) -> Result<DatabaseSettings> {
        Self::settings(name, config, secrets)
    }

    async fn create(&self, name: &str, settings: DatabaseSettings) -> Result<Database> {
        INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);

        let url = settings.url(name)?;
        let redacted = settings.url_without_password(name)?;
        tracing::debug!(
            name,
            url = %redacted,
            max_open = settings.max_open,
            max_idle = settings.max_idle,
            "creating database pool"
        );

        let pool = AnyPoolOptions::new()
            .max_connections(settings.max_open)
            .max_lifetime(Some(MAX_LIFETIME))
            .idle_timeout(Some(settings.idle_timeout))
            .acquire_timeout(settings.dial_timeout)
            .connect_lazy(url.as_str())
            .map_err(|e| Error::initialization(name, "could not create database pool", e))?;

        Ok(Database {
            name: name.to_string(),
            driver: settings.driver,
            pool,
            sink: Arc::clone(&self.sink),
        })
    }

    async fn probe(&self, name: &str, db: &Database) -> Result<()> {
        let mut conn = db
            .pool
            .acquire()
            .await
            .map_err(|e| Error::connectivity(name, "could not connect to database", e))?;
        conn.ping()
            .await
            .map_err(|e| Error::connectivity(name, "database ping failed", e))
    }
}

/// A pooled database handle.
///
/// Every statement run through [`execute`](Self::execute),
/// [`fetch_all`](Self::fetch_all) or [`fetch_optional`](Self::fetch_optional)
/// is reported to the trace sink with its parameters, timing, row count and
/// the caller's source location. A failed statement is followed by a message
/// event carrying the driver error.
pub struct Database {
    name: String,
    driver: Driver,
    pool: AnyPool,
    sink: Arc<dyn TraceSink>,
}

impl Database {
    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Driver
    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Underlying pool, for queries that need the full sqlx API.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Open-connection bound.
    pub fn max_connections(&self) -> u32 {
        self.pool.options().get_max_connections()
    }

    /// Run a statement and return the number of affected rows.
    #[track_caller]
    pub fn execute<'a>(
        &'a self,
        statement: &'a str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<u64>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let started = Instant::now();
            let result = bind_all(statement, &params).execute(&self.pool).await;
            let rows = result.as_ref().ok().map(sqlx::any::AnyQueryResult::rows_affected);
            let failure = result.as_ref().err();
            self.trace(statement, params, started.elapsed(), rows, failure, caller);
            result.map(|r| r.rows_affected()).map_err(|e| self.query_error(e))
        }
    }

    /// Run a query and return every row.
    #[track_caller]
    pub fn fetch_all<'a>(
        &'a self,
        statement: &'a str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Vec<AnyRow>>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let started = Instant::now();
            let result = bind_all(statement, &params).fetch_all(&self.pool).await;
            let rows = result.as_ref().ok().map(|rows| rows.len() as u64);
            let failure = result.as_ref().err();
            self.trace(statement, params, started.elapsed(), rows, failure, caller);
            result.map_err(|e| self.query_error(e))
        }
    }

    /// Run a query and return the first row, if any.
    #[track_caller]
    pub fn fetch_optional<'a>(
        &'a self,
        statement: &'a str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<Option<AnyRow>>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let started = Instant::now();
            let result = bind_all(statement, &params).fetch_optional(&self.pool).await;
            let rows = result.as_ref().ok().map(|row| u64::from(row.is_some()));
            let failure = result.as_ref().err();
            self.trace(statement, params, started.elapsed(), rows, failure, caller);
            result.map_err(|e| self.query_error(e))
        }
    }

    /// Report a diagnostic through the trace sink.
    #[track_caller]
    pub fn report(&self, message: impl Into<String>) {
        let caller = Location::caller();
        self.sink
            .record(TraceEvent::message(message, format_location(caller)));
    }

    fn trace(
        &self,
        statement: &str,
        params: Vec<Value>,
        elapsed: Duration,
        rows: Option<u64>,
        failure: Option<&sqlx::Error>,
        caller: &'static Location<'static>,
    ) {
        let source = format_location(caller);
        self.sink.record(TraceEvent::execution(
            statement,
            params,
            elapsed,
            rows,
            source.clone(),
        ));
        // Driver errors go to the same logger, at ERROR.
        if let Some(e) = failure {
            self.sink.record(TraceEvent::message(e.to_string(), source));
        }
    }

    fn query_error(&self, source: sqlx::Error) -> Error {
        Error::Query {
            resource: self.name.clone(),
            source,
        }
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("driver", &self.driver)
            .field("max_connections", &self.max_connections())
            .finish_non_exhaustive()
    }
}

fn bind_all<'q>(
    statement: &'q str,
    params: &[Value],
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    params
        .iter()
        .fold(sqlx::query::<sqlx::Any>(statement), |query, value| {
            value.bind(query)
        })
}

fn format_location(caller: &Location<'_>) -> String {
    format!("{}:{}", caller.file(), caller.line())
}
