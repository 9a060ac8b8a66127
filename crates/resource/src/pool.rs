//! Bounded connection pool.
//!
//! `Pool<C>` opens connections through a [`Connector`], caps how many are
//! checked out at once (`max_open`), keeps at most `max_idle` of the
//! returned ones, and re-validates an idle connection before handing it out
//! again once it has sat unused for `validate_after`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Connector
// ---------------------------------------------------------------------------

/// Opens and checks connections for a [`Pool`].
pub trait Connector: Send + Sync + 'static {
    /// The pooled connection type.
    type Connection: Send + 'static;

    /// Open a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection>> + Send;

    /// Check that an idle connection still works before reuse.
    fn is_valid(&self, _conn: &mut Self::Connection) -> impl Future<Output = bool> + Send {
        async { true }
    }
}

// ---------------------------------------------------------------------------
// PoolConfig
// ---------------------------------------------------------------------------

/// Pool bounds and timeouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Maximum connections checked out at once
    pub max_open: usize,
    /// Maximum idle connections kept for reuse
    pub max_idle: usize,
    /// Idle connections older than this are closed instead of reused
    pub idle_timeout: Duration,
    /// Connections are closed once they reach this age
    pub max_lifetime: Option<Duration>,
    /// How long [`Pool::acquire`] waits for a free slot
    pub acquire_timeout: Duration,
    /// Idle time after which a connection is validated before reuse
    pub validate_after: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open: 20,
            max_idle: 10,
            idle_timeout: Duration::from_secs(180),
            max_lifetime: None,
            acquire_timeout: Duration::from_secs(5),
            validate_after: Duration::from_secs(1),
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self, resource: &str) -> Result<()> {
        let invalid = |reason: String| Error::Initialization {
            resource: resource.to_string(),
            reason,
            source: None,
        };
        if self.max_open == 0 {
            return Err(invalid("max_open must be greater than 0".into()));
        }
        if self.max_idle > self.max_open {
            return Err(invalid(format!(
                "max_idle ({}) must not exceed max_open ({})",
                self.max_idle, self.max_open
            )));
        }
        if self.acquire_timeout.is_zero() {
            return Err(invalid("acquire_timeout must be greater than zero".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pool internals
// ---------------------------------------------------------------------------

struct Entry<T> {
    conn: T,
    created_at: Instant,
    last_used: Instant,
}

impl<T> Entry<T> {
    fn is_expired(&self, config: &PoolConfig) -> bool {
        self.last_used.elapsed() > config.idle_timeout
            || config
                .max_lifetime
                .is_some_and(|max| self.created_at.elapsed() > max)
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total successful acquisitions.
    pub acquisitions: u64,
    /// Total releases back to the pool.
    pub releases: u64,
    /// Connections currently checked out.
    pub active: usize,
    /// Connections currently idle.
    pub idle: usize,
    /// Connections ever opened.
    pub created: u64,
    /// Connections ever closed by the pool.
    pub destroyed: u64,
}

struct Shared<C: Connector> {
    name: String,
    connector: C,
    config: PoolConfig,
    idle: Mutex<VecDeque<Entry<C::Connection>>>,
    stats: Mutex<PoolStats>,
    /// Limits connections checked out at once.
    semaphore: Arc<Semaphore>,
}

impl<C: Connector> Shared<C> {
    fn release(&self, conn: C::Connection, created_at: Instant) {
        let expired = self
            .config
            .max_lifetime
            .is_some_and(|max| created_at.elapsed() > max);

        let kept = {
            let mut idle = self.idle.lock();
            if !expired && idle.len() < self.config.max_idle {
                idle.push_back(Entry {
                    conn,
                    created_at,
                    last_used: Instant::now(),
                });
                true
            } else {
                false
            }
        };

        let mut stats = self.stats.lock();
        stats.releases += 1;
        stats.active = stats.active.saturating_sub(1);
        if !kept {
            stats.destroyed += 1;
        }
        stats.idle = self.idle.lock().len();
    }
}

// ---------------------------------------------------------------------------
// Pool<C>
// ---------------------------------------------------------------------------

/// Bounded pool of connections opened by `C`.
pub struct Pool<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<C: Connector> Pool<C> {
    /// Create an empty pool. No connection is opened until the first
    /// [`acquire`](Self::acquire).
    ///
    /// # Errors
    /// Returns error if `config` is invalid (e.g. `max_open == 0`).
    pub fn new(name: impl Into<String>, connector: C, config: PoolConfig) -> Result<Self> {
        let name = name.into();
        config.validate(&name)?;
        Ok(Self {
            shared: Arc::new(Shared {
                semaphore: Arc::new(Semaphore::new(config.max_open)),
                idle: Mutex::new(VecDeque::with_capacity(config.max_idle)),
                stats: Mutex::new(PoolStats::default()),
                name,
                connector,
                config,
            }),
        })
    }

    /// Check out a connection, waiting up to `acquire_timeout` for a slot.
    ///
    /// The connection goes back to the pool when the returned handle is
    /// dropped.
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let shared = &self.shared;
        let started = Instant::now();

        let permit = tokio::time::timeout(
            shared.config.acquire_timeout,
            Arc::clone(&shared.semaphore).acquire_owned(),
        )
        .await
        .map_err(|_| Error::PoolExhausted {
            resource: shared.name.clone(),
            max_open: shared.config.max_open,
            waited_ms: started.elapsed().as_millis() as u64,
        })?
        .map_err(|e| Error::internal(&shared.name, "pool semaphore closed", e))?;

        let (conn, created_at) = loop {
            let entry = { shared.idle.lock().pop_front() };
            match entry {
                Some(entry) if entry.is_expired(&shared.config) => {
                    shared.stats.lock().destroyed += 1;
                }
                Some(mut entry) => {
                    if entry.last_used.elapsed() < shared.config.validate_after
                        || shared.connector.is_valid(&mut entry.conn).await
                    {
                        break (entry.conn, entry.created_at);
                    }
                    tracing::debug!(
                        pool = %shared.name,
                        "dropping connection that failed validation"
                    );
                    shared.stats.lock().destroyed += 1;
                }
                None => {
                    let conn = shared.connector.connect().await?;
                    shared.stats.lock().created += 1;
                    break (conn, Instant::now());
                }
            }
        };

        {
            let mut stats = shared.stats.lock();
            stats.acquisitions += 1;
            stats.active += 1;
            stats.idle = shared.idle.lock().len();
        }

        Ok(PooledConnection {
            conn: Some(conn),
            created_at,
            shared: Arc::clone(shared),
            _permit: permit,
        })
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.stats.lock().clone()
    }

    /// The bounds this pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// The connector used to open connections.
    pub fn connector(&self) -> &C {
        &self.shared.connector
    }
}

// ---------------------------------------------------------------------------
// PooledConnection
// ---------------------------------------------------------------------------

/// A checked-out connection. Returns to the pool on drop.
pub struct PooledConnection<C: Connector> {
    conn: Option<C::Connection>,
    created_at: Instant,
    shared: Arc<Shared<C>>,
    _permit: OwnedSemaphorePermit,
}

impl<C: Connector> PooledConnection<C> {
    /// Close the connection instead of returning it to the pool.
    pub fn detach(mut self) -> C::Connection {
        let conn = self.conn.take().expect("connection present until drop");
        let mut stats = self.shared.stats.lock();
        stats.active = stats.active.saturating_sub(1);
        stats.destroyed += 1;
        conn
    }
}

impl<C: Connector> std::ops::Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &C::Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl<C: Connector> std::ops::DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C::Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn, self.created_at);
        }
    }
}

impl<C: Connector> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.shared.name)
            .field("age", &self.created_at.elapsed())
            .finish_non_exhaustive()
    }
}
