//! Resource capability surface
//!
//! A [`Resource`] turns one named config section into a live client in three
//! steps: [`configure`](Resource::configure) validates fields and applies
//! defaults without touching the network, [`create`](Resource::create)
//! builds the pooled client, and [`probe`](Resource::probe) proves the
//! backend answers. [`build`] runs the three in order; any failure is fatal.

use std::fmt;
use std::future::Future;

use strata_config::Config;

use crate::credentials::Secrets;
use crate::error::Result;

/// Kind of backend a resource talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Relational database
    Database,
    /// Key-value cache
    Cache,
    /// Object storage bucket
    ObjectStorage,
    /// File-backed structured logger
    Logger,
}

impl ResourceKind {
    /// Config section holding this kind's fields.
    pub const fn section(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Cache => "redis",
            Self::ObjectStorage => "storage",
            Self::Logger => "log",
        }
    }

    /// All kinds, in dependency order (loggers first).
    pub const ALL: [Self; 4] = [
        Self::Logger,
        Self::Database,
        Self::Cache,
        Self::ObjectStorage,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database",
            Self::Cache => "cache",
            Self::ObjectStorage => "object storage",
            Self::Logger => "logger",
        })
    }
}

/// Factory for one kind of named resource.
pub trait Resource: Send + Sync {
    /// Which kind this factory builds.
    const KIND: ResourceKind;

    /// Validated fields with defaults applied.
    type Settings: Send;

    /// The constructed client.
    type Instance: Send + Sync + 'static;

    /// Read and validate `<name>.*` fields. Pure: no I/O beyond the config.
    fn configure(&self, name: &str, config: &Config, secrets: &Secrets) -> Result<Self::Settings>;

    /// Build the client from validated settings.
    fn create(
        &self,
        name: &str,
        settings: Self::Settings,
    ) -> impl Future<Output = Result<Self::Instance>> + Send;

    /// One round-trip proving the backend is reachable.
    fn probe(&self, name: &str, instance: &Self::Instance)
    -> impl Future<Output = Result<()>> + Send;
}

/// Configure, create and probe `name` with `resource`.
pub async fn build<R: Resource>(
    resource: &R,
    name: &str,
    config: &Config,
    secrets: &Secrets,
) -> Result<R::Instance> {
    let settings = resource.configure(name, config, secrets)?;
    build_configured(resource, name, settings).await
}

/// Create and probe `name` from settings that were already validated.
pub async fn build_configured<R: Resource>(
    resource: &R,
    name: &str,
    settings: R::Settings,
) -> Result<R::Instance> {
    let instance = resource.create(name, settings).await?;
    resource.probe(name, &instance).await?;
    tracing::debug!(kind = %R::KIND, name, "probe succeeded");
    Ok(instance)
}
