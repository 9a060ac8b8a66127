//! Named-resource registry with at-most-once construction.
//!
//! Readers load an immutable snapshot of the name → resource map without
//! taking any lock. A miss falls through to a single construction mutex:
//! the caller re-checks the snapshot, runs the factory while holding the
//! mutex, then publishes a new snapshot that contains the entry. Ready
//! entries are never replaced or removed.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;

use crate::error::Result;

/// Observable state of one name in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never built, or every build attempt so far failed
    Absent,
    /// A factory for this name is running
    Constructing,
    /// Built; every caller receives the same instance
    Ready,
}

/// Lazily-populated map from resource name to shared instance.
pub struct Registry<T> {
    label: &'static str,
    entries: ArcSwap<HashMap<String, Arc<T>>>,
    construction: tokio::sync::Mutex<()>,
    constructing: parking_lot::Mutex<Option<String>>,
}

impl<T> Registry<T> {
    /// Create an empty registry. `label` appears in log lines.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            entries: ArcSwap::from_pointee(HashMap::new()),
            construction: tokio::sync::Mutex::new(()),
            constructing: parking_lot::Mutex::new(None),
        }
    }

    /// Return the instance for `name`, building it with `factory` on first
    /// use.
    ///
    /// Concurrent first-time callers for the same name run `factory` at
    /// most once between them and all receive the same `Arc`. Builds for
    /// different names are serialized. A failed build leaves the name
    /// absent and returns the factory's error unchanged; the next call runs
    /// a fresh factory. Dropping the returned future mid-build has the same
    /// effect as a failure.
    pub async fn get<F, Fut>(&self, name: &str, factory: F) -> Result<Arc<T>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(found) = self.lookup(name) {
            return Ok(found);
        }

        let _lock = self.construction.lock().await;

        // Another caller may have finished while we waited.
        if let Some(found) = self.lookup(name) {
            return Ok(found);
        }

        let _marker = ConstructingMarker::set(&self.constructing, name);
        let started = Instant::now();
        tracing::debug!(registry = self.label, name, "constructing resource");

        let instance = match factory(name.to_string()).await {
            Ok(instance) => Arc::new(instance),
            Err(e) => {
                tracing::error!(
                    registry = self.label,
                    name,
                    error = %e,
                    "resource construction failed"
                );
                return Err(e);
            }
        };

        let mut next = HashMap::clone(&self.entries.load());
        next.insert(name.to_string(), Arc::clone(&instance));
        self.entries.store(Arc::new(next));

        tracing::info!(
            registry = self.label,
            name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resource ready"
        );
        Ok(instance)
    }

    /// The ready instance for `name`, without building it.
    pub fn lookup(&self, name: &str) -> Option<Arc<T>> {
        self.entries.load().get(name).cloned()
    }

    /// Current state of `name`.
    pub fn state(&self, name: &str) -> EntryState {
        if self.entries.load().contains_key(name) {
            EntryState::Ready
        } else if self.constructing.lock().as_deref() == Some(name) {
            EntryState::Constructing
        } else {
            EntryState::Absent
        }
    }

    /// Names of all ready entries, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.load().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of ready entries.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Whether no entry is ready yet.
    pub fn is_empty(&self) -> bool {
        self.entries.load().is_empty()
    }
}

impl<T> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("label", &self.label)
            .field("ready", &self.names())
            .field("constructing", &*self.constructing.lock())
            .finish()
    }
}

/// Marks a name as under construction until dropped.
struct ConstructingMarker<'a> {
    slot: &'a parking_lot::Mutex<Option<String>>,
}

impl<'a> ConstructingMarker<'a> {
    fn set(slot: &'a parking_lot::Mutex<Option<String>>, name: &str) -> Self {
        *slot.lock() = Some(name.to_string());
        Self { slot }
    }
}

impl Drop for ConstructingMarker<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn second_get_hits_the_snapshot() {
        let registry = Registry::new("test");
        let first = registry.get("a", |_| async { Ok(1u32) }).await.unwrap();
        let second = registry.get("a", |_| async { Ok(2u32) }).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*second, 1);
        assert_eq!(registry.names(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn factory_receives_the_name() {
        let registry = Registry::new("test");
        let got = registry
            .get("session-cache", |name| async move { Ok(name) })
            .await
            .unwrap();
        assert_eq!(got.as_str(), "session-cache");
    }

    #[tokio::test]
    async fn failure_leaves_name_absent() {
        let registry: Registry<u32> = Registry::new("test");
        let err = registry
            .get("db", |name| async move {
                Err(Error::ConfigMissing {
                    resource: name,
                    section: "database".into(),
                    field: "host".into(),
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(registry.state("db"), EntryState::Absent);
        assert!(registry.is_empty());

        let value = registry.get("db", |_| async { Ok(7) }).await.unwrap();
        assert_eq!(*value, 7);
        assert_eq!(registry.state("db"), EntryState::Ready);
    }
}
