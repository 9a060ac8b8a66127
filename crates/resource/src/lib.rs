//! # Strata Resource Management
//!
//! Named backend clients for services: relational databases, Redis caches,
//! S3-compatible object stores and file loggers, each built lazily from its
//! config section and shared for the life of the process.
//!
//! [`Manager`] is the entry point. It keeps one [`Registry`] per
//! [`ResourceKind`]; the first request for a name runs the kind's
//! [`Resource`] factory (configure, create, probe) and every later request
//! receives the same `Arc`.

pub mod cache;
pub mod credentials;
pub mod database;
pub mod error;
pub mod logger;
pub mod manager;
pub mod pool;
pub mod registry;
pub mod resource;
mod settings;
pub mod storage;

pub use cache::{Cache, CacheResource, CacheSettings, RedisConnector};
pub use credentials::{CREDENTIAL_KEY_ENV, Secrets};
pub use database::trace::{
    LogSink, NullSink, TraceEvent, TraceKind, TraceLine, TraceSink, render, substitute,
};
pub use database::{Database, DatabaseResource, DatabaseSettings, Driver, Value};
pub use error::{BoxError, Error, Result};
pub use logger::{LoggerResource, LoggerSettings, preset_for};
pub use manager::Manager;
pub use pool::{Connector, Pool, PoolConfig, PoolStats, PooledConnection};
pub use registry::{EntryState, Registry};
pub use resource::{Resource, ResourceKind, build, build_configured};
pub use storage::{ObjectStore, StorageResource, StorageSettings};
