//! Unit tests for the in-memory session store.

#![cfg(unix)]

use std::sync::Arc;

use exec_bridge::orchestrator::store::SessionStore;
use exec_bridge::AppError;

use super::support::shell_session;

#[tokio::test]
async fn put_then_get_returns_same_session() {
    let store = SessionStore::new();
    let session = shell_session("sleep 30");
    let id = session.id().to_owned();

    store.put(Arc::clone(&session)).await.expect("put");

    let found = store.get(&id).await.expect("get");
    assert!(Arc::ptr_eq(&found, &session));
    assert!(store.contains(&id).await);
    assert_eq!(store.len().await, 1);

    store.remove(&id).await.expect("registered").terminate().await;
}

#[tokio::test]
async fn duplicate_put_is_rejected() {
    let store = SessionStore::new();
    let session = shell_session("sleep 30");

    store.put(Arc::clone(&session)).await.expect("first put");
    let err = store.put(Arc::clone(&session)).await.expect_err("duplicate");
    assert!(matches!(err, AppError::SessionExists(_)));

    session.terminate().await;
}

#[tokio::test]
async fn get_unknown_is_not_found() {
    let store = SessionStore::new();
    let err = store.get("missing").await.expect_err("unknown id");
    assert!(matches!(err, AppError::SessionNotFound(ref id) if id == "missing"));
}

#[tokio::test]
async fn remove_hands_out_a_session_once() {
    let store = SessionStore::new();
    let session = shell_session("sleep 30");
    let id = session.id().to_owned();
    store.put(session).await.expect("put");

    let first = store.remove(&id).await;
    let second = store.remove(&id).await;

    assert!(first.is_some());
    assert!(second.is_none());
    assert!(store.is_empty().await);
    if let Some(session) = first {
        session.terminate().await;
    }
}

#[tokio::test]
async fn concurrent_removals_have_one_winner() {
    let store = Arc::new(SessionStore::new());
    let session = shell_session("sleep 30");
    let id = session.id().to_owned();
    store.put(session).await.expect("put");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = Arc::clone(&store);
        let id = id.clone();
        handles.push(tokio::spawn(async move { store.remove(&id).await }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        if let Some(session) = handle.await.expect("task") {
            winners.push(session);
        }
    }

    assert_eq!(winners.len(), 1);
    winners[0].terminate().await;
}

#[tokio::test]
async fn for_each_visits_every_session() {
    let store = SessionStore::new();
    for _ in 0..3 {
        store.put(shell_session("sleep 30")).await.expect("put");
    }

    let mut ids = Vec::new();
    store.for_each(|session| ids.push(session.id().to_owned())).await;
    assert_eq!(ids.len(), 3);

    for id in &ids {
        store.remove(id).await.expect("present").terminate().await;
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn drain_empties_the_store() {
    let store = SessionStore::new();
    store.put(shell_session("sleep 30")).await.expect("put");
    store.put(shell_session("sleep 30")).await.expect("put");

    let drained = store.drain().await;

    assert_eq!(drained.len(), 2);
    assert!(store.is_empty().await);
    for session in drained {
        session.terminate().await;
    }
}
