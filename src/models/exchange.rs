//! Wire types for the `execute` request/response exchange.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/execute`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    /// Program source; `code` is accepted for older clients.
    #[serde(default, alias = "code")]
    pub source: Option<String>,
    /// Line of input for a waiting session (terminator added by the bridge).
    #[serde(default)]
    pub input: Option<String>,
    /// Session to continue.
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ExecuteRequest {
    /// Source text when present and non-empty.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref().filter(|s| !s.is_empty())
    }

    /// `(session_id, input)` when both are present.
    ///
    /// An empty input line is still a valid answer (plain Enter).
    #[must_use]
    pub fn continuation(&self) -> Option<(&str, &str)> {
        match (self.session_id.as_deref(), self.input.as_deref()) {
            (Some(id), Some(input)) if !id.is_empty() => Some((id, input)),
            _ => None,
        }
    }
}

/// Successful reply to a start or continue call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecReply {
    /// Full transcript on start; the new increment on continue.
    pub output: String,
    /// Session handle for follow-up calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Whether the process has finished and the session is gone.
    pub completed: bool,
    /// Best guess whether the process now blocks on stdin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_for_input: Option<bool>,
    /// Exit code when completed and known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ExecReply {
    /// Reply for a session that is gone before the call began.
    #[must_use]
    pub fn nothing_to_resume(session_id: &str) -> Self {
        Self {
            output: String::new(),
            session_id: Some(session_id.to_owned()),
            completed: true,
            waiting_for_input: Some(false),
            exit_code: None,
        }
    }
}

/// Error payload returned with a non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Short, user-facing summary.
    pub error: String,
    /// Optional diagnostic detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Query string of `DELETE /api/execute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateQuery {
    /// Session to terminate; absent is a no-op.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Reply to `DELETE /api/execute`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TerminateReply {
    /// Always `true`; termination is idempotent.
    pub success: bool,
}
