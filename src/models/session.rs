//! Session state values and identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a bridged process session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Process is computing or output is still arriving.
    Running,
    /// Classifier believes the process is blocked reading stdin.
    AwaitingInput,
    /// Process is gone and the session has left the store.
    Terminated,
}

/// Recorded exit of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// OS exit code; `None` when the process was ended by a signal.
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// Human-readable exit description for logs.
    #[must_use]
    pub fn describe(&self) -> String {
        self.code.map_or_else(
            || "process terminated by signal".to_owned(),
            |c| format!("process exited with code {c}"),
        )
    }
}

/// Generate a fresh, never-reused session identifier.
#[must_use]
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
