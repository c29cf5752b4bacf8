//! Integration tests for age-based session eviction.
//!
//! Sessions wrap shell commands, so these run without Python.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use exec_bridge::config::ReaperConfig;
use exec_bridge::orchestrator::reaper::{spawn_reaper, sweep};
use exec_bridge::orchestrator::store::SessionStore;

use super::test_helpers::{process_alive, shell_session};

#[tokio::test]
async fn sweep_evicts_expired_sessions_and_kills_them() {
    let store = SessionStore::new();
    let first = shell_session("sleep 30");
    let second = shell_session("printf 'Choice? '; read x");
    let pids = [first.pid().expect("pid"), second.pid().expect("pid")];
    store.put(Arc::clone(&first)).await.expect("put");
    store.put(Arc::clone(&second)).await.expect("put");

    tokio::time::sleep(Duration::from_millis(20)).await;
    let evicted = sweep(&store, Duration::from_millis(10)).await;

    assert_eq!(evicted, 2);
    assert!(store.is_empty().await);
    assert!(first.observation().terminated);
    assert!(second.observation().terminated);
    for pid in pids {
        assert!(!process_alive(pid), "pid {pid} must be gone");
    }
}

#[tokio::test]
async fn sweep_keeps_young_sessions() {
    let store = SessionStore::new();
    let session = shell_session("sleep 30");
    store.put(Arc::clone(&session)).await.expect("put");

    let evicted = sweep(&store, Duration::from_secs(300)).await;

    assert_eq!(evicted, 0);
    assert!(store.contains(session.id()).await);
    assert!(!session.observation().terminated);

    store
        .remove(session.id())
        .await
        .expect("present")
        .terminate()
        .await;
}

#[tokio::test]
async fn sweep_skips_sessions_removed_concurrently() {
    let store = SessionStore::new();
    let session = shell_session("sleep 30");
    store.put(Arc::clone(&session)).await.expect("put");

    // Someone else wins the removal first.
    let removed = store.remove(session.id()).await.expect("present");
    let evicted = sweep(&store, Duration::ZERO).await;

    assert_eq!(evicted, 0);
    removed.terminate().await;
}

#[tokio::test]
async fn background_reaper_sweeps_until_cancelled() {
    let store = Arc::new(SessionStore::new());
    let session = shell_session("sleep 30");
    store.put(Arc::clone(&session)).await.expect("put");

    let cancel = CancellationToken::new();
    let config = ReaperConfig {
        interval_seconds: 1,
        max_age_seconds: 0,
    };
    let handle = spawn_reaper(Arc::clone(&store), config, cancel.clone());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !session.observation().terminated {
        assert!(tokio::time::Instant::now() < deadline, "reaper never evicted");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(store.is_empty().await);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("reaper stops on cancel")
        .expect("reaper task");
}
