//! Route handlers.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;

use super::AppState;
use crate::models::exchange::{ExecReply, ExecuteRequest, TerminateQuery, TerminateReply};
use crate::AppError;

/// Handler for `GET /health`; returns 200 OK with a plain-text body.
pub async fn health() -> &'static str {
    "ok"
}

/// Handler for `POST /api/execute`.
///
/// # Errors
///
/// Malformed bodies and missing fields map to 400; launcher failures to 500.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecReply>, AppError> {
    let Json(request) = body.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let reply = state.coordinator.execute(&request).await?;
    Ok(Json(reply))
}

/// Handler for `DELETE /api/execute?sessionId=<id>`; always succeeds.
pub async fn terminate(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TerminateQuery>, QueryRejection>,
) -> Json<TerminateReply> {
    let query = query.map(|Query(query)| query).unwrap_or_default();
    if let Some(session_id) = query.session_id.as_deref().filter(|id| !id.is_empty()) {
        state.coordinator.terminate(session_id).await;
    }
    Json(TerminateReply { success: true })
}
