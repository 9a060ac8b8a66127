//! Construction guarantees of the named-resource registry under contention.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use pretty_assertions::assert_eq;
use strata_resource::{EntryState, Error, Registry};
use tokio::sync::Notify;
use tokio::task::JoinSet;

fn refused(name: &str) -> Error {
    Error::connectivity(name, "connection refused", std::io::Error::other("refused"))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_use_builds_once() {
    let registry = Arc::new(Registry::<String>::new("test"));
    let builds = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for _ in 0..32 {
        let registry = Arc::clone(&registry);
        let builds = Arc::clone(&builds);
        tasks.spawn(async move {
            registry
                .get("primary", |name| async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(format!("client for {name}"))
                })
                .await
                .unwrap()
        });
    }

    let handles: Vec<Arc<String>> = tasks.join_all().await;
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(handles.len(), 32);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(handles[0].as_str(), "client for primary");
    assert_eq!(registry.state("primary"), EntryState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn names_are_isolated() {
    let registry = Arc::new(Registry::<String>::new("test"));
    let builds = Arc::new(AtomicUsize::new(0));

    let mut tasks = JoinSet::new();
    for i in 0..20 {
        let registry = Arc::clone(&registry);
        let builds = Arc::clone(&builds);
        let name = if i % 2 == 0 { "orders" } else { "users" };
        tasks.spawn(async move {
            registry
                .get(name, |name| async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    Ok(name)
                })
                .await
                .unwrap()
        });
    }

    for handle in tasks.join_all().await {
        assert!(handle.as_str() == "orders" || handle.as_str() == "users");
    }
    assert_eq!(builds.load(Ordering::SeqCst), 2);
    assert_eq!(registry.names(), vec!["orders".to_string(), "users".to_string()]);

    let orders = registry.lookup("orders").unwrap();
    let users = registry.lookup("users").unwrap();
    assert!(!Arc::ptr_eq(&orders, &users));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn state_is_constructing_while_factory_runs() {
    let registry = Arc::new(Registry::<u32>::new("test"));
    let release = Arc::new(Notify::new());

    let builder = {
        let registry = Arc::clone(&registry);
        let release = Arc::clone(&release);
        tokio::spawn(async move {
            registry
                .get("slow", |_| async move {
                    release.notified().await;
                    Ok(7)
                })
                .await
        })
    };

    while registry.state("slow") != EntryState::Constructing {
        tokio::task::yield_now().await;
    }
    assert_eq!(registry.state("other"), EntryState::Absent);
    assert!(registry.lookup("slow").is_none());

    release.notify_one();
    assert_eq!(*builder.await.unwrap().unwrap(), 7);
    assert_eq!(registry.state("slow"), EntryState::Ready);
}

#[tokio::test]
async fn failed_construction_is_not_cached() {
    let registry = Registry::<u32>::new("test");
    let attempts = AtomicUsize::new(0);
    let attempts = &attempts;

    for _ in 0..3 {
        let err = registry
            .get("cache", |name| async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(refused(&name))
            })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(registry.state("cache"), EntryState::Absent);
    }

    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert!(registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn abandoned_construction_leaves_name_absent() {
    let registry = Registry::<u32>::new("test");

    let outcome = tokio::time::timeout(
        Duration::from_millis(10),
        registry.get("stuck", |_| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        }),
    )
    .await;
    assert!(outcome.is_err());
    assert_eq!(registry.state("stuck"), EntryState::Absent);

    let value = registry.get("stuck", |_| async { Ok(2) }).await.unwrap();
    assert_eq!(*value, 2);
}

#[tokio::test(start_paused = true)]
async fn waiters_share_one_slow_construction() {
    let registry = Registry::<u32>::new("test");
    let builds = AtomicUsize::new(0);
    let builds = &builds;
    let started = tokio::time::Instant::now();

    let results = join_all((0..10).map(|_| {
        registry.get("db", |_| async move {
            builds.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1)
        })
    }))
    .await;

    let elapsed = started.elapsed();
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(elapsed >= Duration::from_millis(50), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(100), "elapsed {elapsed:?}");
}
