//! Key-value cache clients (Redis).
//!
//! Fields under `[redis]`, each prefixed with the resource name: `host` and
//! `port` are required; `auth`, `db`, `max_open` (20), `max_idle` (10),
//! `dial_timeout_ms` (100), `read_timeout_ms` (1000), `write_timeout_ms`
//! (1000), `idle_timeout_secs` (180) and `acquire_timeout_ms` (5000) are
//! optional.

use std::fmt;
use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, FromRedisValue};
use secrecy::{ExposeSecret, SecretString};
use strata_config::Config;
use url::Url;

use crate::credentials::Secrets;
use crate::error::{Error, Result};
use crate::pool::{Connector, Pool, PoolConfig, PoolStats, PooledConnection};
use crate::resource::{Resource, ResourceKind};
use crate::settings::Fields;

const DEFAULT_MAX_OPEN: usize = 20;
const DEFAULT_MAX_IDLE: usize = 10;

/// Validated cache fields
pub struct CacheSettings {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Server password
    pub auth: Option<SecretString>,
    /// Database index
    pub db: i64,
    /// Connection pool bounds
    pub pool: PoolConfig,
    /// Connect deadline
    pub dial_timeout: Duration,
    /// Reply deadline
    pub read_timeout: Duration,
    /// Send deadline
    pub write_timeout: Duration,
}

impl CacheSettings {
    fn url(&self, resource: &str) -> Result<Url> {
        let invalid = |field: &str, found: String| Error::ConfigType {
            resource: resource.to_string(),
            section: ResourceKind::Cache.section().to_string(),
            field: field.to_string(),
            expected: "hostname",
            found,
        };

        let mut url = Url::parse("redis://localhost/")
            .map_err(|e| Error::initialization(resource, "invalid connection URL", e))?;
        url.set_host(Some(&self.host))
            .map_err(|e| invalid("host", format!("{:?} ({e})", self.host)))?;
        url.set_port(Some(self.port))
            .map_err(|()| invalid("port", self.port.to_string()))?;
        if let Some(auth) = &self.auth {
            url.set_password(Some(auth.expose_secret()))
                .map_err(|()| invalid("auth", "<redacted>".to_string()))?;
        }
        url.set_path(&self.db.to_string());
        Ok(url)
    }
}

impl fmt::Debug for CacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("auth", &self.auth.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Opens multiplexed Redis connections with dial and read deadlines.
pub struct RedisConnector {
    name: String,
    client: Client,
    dial_timeout: Duration,
    read_timeout: Duration,
}

impl RedisConnector {
    async fn ping(&self, conn: &mut MultiplexedConnection) -> Result<()> {
        tokio::time::timeout(
            self.read_timeout,
            redis::cmd("PING").query_async::<String>(conn),
        )
        .await
        .map_err(|_| Error::timeout(&self.name, "ping", self.read_timeout))?
        .map(drop)
        .map_err(|e| Error::connectivity(&self.name, "PING failed", e))
    }
}

impl Connector for RedisConnector {
    type Connection = MultiplexedConnection;

    async fn connect(&self) -> Result<MultiplexedConnection> {
        tokio::time::timeout(
            self.dial_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| Error::timeout(&self.name, "dial", self.dial_timeout))?
        .map_err(|e| Error::connectivity(&self.name, "could not connect to redis", e))
    }

    async fn is_valid(&self, conn: &mut MultiplexedConnection) -> bool {
        self.ping(conn).await.is_ok()
    }
}

/// Builds [`Cache`] clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheResource;

impl Resource for CacheResource {
    const KIND: ResourceKind = ResourceKind::Cache;
    type Settings = CacheSettings;
    type Instance = Cache;

    fn configure(&self, name: &str, config: &Config, secrets: &Secrets) -> Result<CacheSettings> {
        let fields = Fields::new(Self::KIND, name, config);
        let ms = Duration::from_millis(1);
        let secs = Duration::from_secs(1);

        let max_open = fields.count_or("max_open", DEFAULT_MAX_OPEN)?;
        let max_idle = usize::try_from(fields.int_or("max_idle", DEFAULT_MAX_IDLE as i64)?)
            .map_err(|_| fields.invalid("max_idle", "non-negative integer", "negative"))?
            .min(max_open);

        let pool = PoolConfig {
            max_open,
            max_idle,
            idle_timeout: fields.duration_or("idle_timeout_secs", Duration::from_secs(180), secs)?,
            max_lifetime: None,
            acquire_timeout: fields.duration_or("acquire_timeout_ms", Duration::from_secs(5), ms)?,
            validate_after: Duration::from_secs(1),
        };

        Ok(CacheSettings {
            host: fields.string("host")?,
            port: fields.port("port")?,
            auth: fields.optional_secret("auth", secrets)?,
            db: fields.int_or("db", 0)?,
            pool,
            dial_timeout: fields.duration_or("dial_timeout_ms", Duration::from_millis(100), ms)?,
            read_timeout: fields.duration_or("read_timeout_ms", Duration::from_secs(1), ms)?,
            write_timeout: fields.duration_or("write_timeout_ms", Duration::from_secs(1), ms)?,
        })
    }

    async fn create(&self, name: &str, settings: CacheSettings) -> Result<Cache> {
        let url = settings.url(name)?;
        let client = Client::open(url.as_str())
            .map_err(|e| Error::initialization(name, "invalid redis address", e))?;

        tracing::debug!(
            name,
            host = %settings.host,
            port = settings.port,
            max_open = settings.pool.max_open,
            max_idle = settings.pool.max_idle,
            "creating redis pool"
        );

        let connector = RedisConnector {
            name: name.to_string(),
            client,
            dial_timeout: settings.dial_timeout,
            read_timeout: settings.read_timeout,
        };
        Ok(Cache {
            name: name.to_string(),
            command_timeout: settings.read_timeout + settings.write_timeout,
            pool: Pool::new(name, connector, settings.pool)?,
        })
    }

    async fn probe(&self, _name: &str, cache: &Cache) -> Result<()> {
        cache.ping().await
    }
}

/// A pooled Redis client.
pub struct Cache {
    name: String,
    command_timeout: Duration,
    pool: Pool<RedisConnector>,
}

impl Cache {
    /// Resource name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check out a connection for direct use with `redis::AsyncCommands`.
    pub async fn connection(&self) -> Result<PooledConnection<RedisConnector>> {
        self.pool.acquire().await
    }

    /// Run one command on a pooled connection under the read + write
    /// deadline.
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.connection().await?;
        tokio::time::timeout(self.command_timeout, cmd.query_async::<T>(&mut *conn))
            .await
            .map_err(|_| Error::timeout(&self.name, "command", self.command_timeout))?
            .map_err(|e| Error::internal(&self.name, "redis command failed", e))
    }

    /// Round-trip a `PING`.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        self.pool.connector().ping(&mut conn).await
    }

    /// Pool bounds.
    pub fn pool_config(&self) -> &PoolConfig {
        self.pool.config()
    }

    /// Pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .finish()
    }
}
