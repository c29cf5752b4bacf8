//! Mapping from [`AppError`] to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::models::exchange::ErrorBody;
use crate::AppError;

impl AppError {
    /// Status code and JSON body for this error.
    #[must_use]
    pub fn to_error_body(&self) -> (StatusCode, ErrorBody) {
        match self {
            Self::LauncherUnavailable(attempted) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Interpreter not available".into(),
                    details: Some(format!(
                        "No interpreter could be started. Install Python or set PYTHON_PATH. \
                         Tried commands: {}",
                        attempted.join(", ")
                    )),
                },
            ),
            Self::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: msg.clone(),
                    details: None,
                },
            ),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "Failed to execute code".into(),
                    details: Some(other.to_string()),
                },
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_error_body();
        if status.is_server_error() {
            error!(err = %self, "request failed");
        }
        (status, Json(body)).into_response()
    }
}
