//! Integration tests for the HTTP transport.
//!
//! Each test binds its own listener on an ephemeral port and drives it with
//! `reqwest`.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use exec_bridge::http::{self, AppState};
use exec_bridge::orchestrator::coordinator::Coordinator;

use super::test_helpers::{
    skip_without_python, test_app_state, test_config, test_coordinator, unavailable_coordinator,
};

/// Serve `coordinator` on an ephemeral port; cancel the token to stop.
async fn spawn_server(coordinator: Arc<Coordinator>) -> (String, CancellationToken) {
    let state: Arc<AppState> = test_app_state(coordinator);
    let listener = http::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    tokio::spawn(async move {
        let _ = http::serve(state, listener, server_ct).await;
    });

    (format!("http://{addr}"), ct)
}

#[tokio::test]
async fn health_returns_ok() {
    let (base, ct) = spawn_server(test_coordinator(&test_config(5000))).await;

    let resp = reqwest::get(format!("{base}/health")).await.expect("GET /health");

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.expect("body"), "ok");
    ct.cancel();
}

#[tokio::test]
async fn empty_body_is_bad_request() {
    let (base, ct) = spawn_server(test_coordinator(&test_config(5000))).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/execute"))
        .json(&json!({}))
        .send()
        .await
        .expect("POST");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "Code or input required");
    ct.cancel();
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let (base, ct) = spawn_server(test_coordinator(&test_config(5000))).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/execute"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("POST");

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.expect("json body");
    assert!(body["error"].is_string());
    ct.cancel();
}

#[tokio::test]
async fn unknown_session_continue_is_soft_completed() {
    let (base, ct) = spawn_server(test_coordinator(&test_config(5000))).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/execute"))
        .json(&json!({ "sessionId": "gone", "input": "1" }))
        .send()
        .await
        .expect("POST");

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["completed"], true);
    assert_eq!(body["output"], "");
    ct.cancel();
}

#[tokio::test]
async fn unavailable_interpreter_is_server_error() {
    let (base, ct) = spawn_server(unavailable_coordinator()).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/execute"))
        .json(&json!({ "source": "print(1)" }))
        .send()
        .await
        .expect("POST");

    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.expect("json body");
    assert_eq!(body["error"], "Interpreter not available");
    let details = body["details"].as_str().expect("details");
    assert!(details.contains("exec-bridge-no-such-interpreter"));
    ct.cancel();
}

#[tokio::test]
async fn delete_always_succeeds() {
    let (base, ct) = spawn_server(test_coordinator(&test_config(5000))).await;
    let client = reqwest::Client::new();

    for url in [
        format!("{base}/api/execute?sessionId=unknown"),
        format!("{base}/api/execute"),
        format!("{base}/api/execute?sessionId="),
    ] {
        let resp = client.delete(&url).send().await.expect("DELETE");
        assert_eq!(resp.status(), 200, "{url}");
        let body: Value = resp.json().await.expect("json body");
        assert_eq!(body, json!({ "success": true }));
    }
    ct.cancel();
}

#[tokio::test]
async fn interactive_program_over_http() {
    if skip_without_python() {
        return;
    }
    let coordinator = test_coordinator(&test_config(5000));
    let (base, ct) = spawn_server(Arc::clone(&coordinator)).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{base}/api/execute"))
        .json(&json!({ "source": "x = input('Age: ')\nprint(f'You are {x}')" }))
        .send()
        .await
        .expect("start")
        .json()
        .await
        .expect("json");

    assert_eq!(first["completed"], false);
    assert_eq!(first["waitingForInput"], true);
    assert_eq!(first["output"], "Age: ");
    let session_id = first["sessionId"].as_str().expect("sessionId").to_owned();

    let second: Value = client
        .post(format!("{base}/api/execute"))
        .json(&json!({ "sessionId": session_id, "input": "30" }))
        .send()
        .await
        .expect("continue")
        .json()
        .await
        .expect("json");

    assert_eq!(second["completed"], true);
    assert_eq!(second["exitCode"], 0);
    assert!(second["output"]
        .as_str()
        .expect("output")
        .starts_with("You are 30\n"));
    assert!(coordinator.store().is_empty().await);
    ct.cancel();
}

#[tokio::test]
async fn delete_terminates_a_waiting_session() {
    if skip_without_python() {
        return;
    }
    let coordinator = test_coordinator(&test_config(5000));
    let (base, ct) = spawn_server(Arc::clone(&coordinator)).await;
    let client = reqwest::Client::new();

    let reply: Value = client
        .post(format!("{base}/api/execute"))
        .json(&json!({ "code": "x = input('Name? ')" }))
        .send()
        .await
        .expect("start")
        .json()
        .await
        .expect("json");
    let session_id = reply["sessionId"].as_str().expect("sessionId").to_owned();
    assert!(coordinator.store().contains(&session_id).await);

    let resp = client
        .delete(format!("{base}/api/execute?sessionId={session_id}"))
        .send()
        .await
        .expect("DELETE");
    assert_eq!(resp.status(), 200);
    assert!(!coordinator.store().contains(&session_id).await);
    ct.cancel();
}
