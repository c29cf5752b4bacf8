//! Shared helpers for unit tests that need a live child process.
//!
//! Sessions here wrap plain shell commands so the tests do not depend on an
//! installed Python interpreter.

#![cfg(unix)]

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use exec_bridge::classifier::HeuristicClassifier;
use exec_bridge::models::session::new_session_id;
use exec_bridge::orchestrator::session::{Observation, Session};
use exec_bridge::orchestrator::wait::{self, Waited};
use exec_bridge::process::launcher::{LaunchedProcess, END_MARKER};

/// Start `sh -c script` as a bridged session.
pub fn shell_session(script: &str) -> Arc<Session> {
    let child = Command::new("sh")
        .args(["-c", script])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0)
        .spawn()
        .expect("spawn sh");
    let process = LaunchedProcess::from_child("sh", child).expect("piped stdio");
    let classifier = HeuristicClassifier::default().with_end_marker(END_MARKER);
    Session::spawn(new_session_id(), process, Arc::new(classifier))
}

/// Wait up to five seconds for `ready` to hold on the session observation.
pub async fn wait_for<F>(session: &Session, ready: F) -> Observation
where
    F: FnMut(&Observation) -> bool,
{
    let mut rx = session.subscribe();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    match wait::until(&mut rx, deadline, ready).await {
        Waited::Ready(observation) => observation,
        other => panic!("observation never became ready: {other:?}"),
    }
}

/// Whether a process with `pid` is still running.
pub fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Orphans are reaped by init at its own pace; a zombie counts as gone.
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        let state = stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next());
        return state != Some('Z');
    }
    let pid = i32::try_from(pid).expect("pid fits i32");
    kill(Pid::from_raw(pid), None).is_ok()
}
