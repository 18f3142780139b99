use autopilot_core::AutopilotError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 404 Not Found errors
// ---------------------------------------------------------------------------

/// Carries an explicit HTTP 404 through the `anyhow::Error` chain; the core
/// error enum has no notion of a missing HTTP resource.
#[derive(Debug)]
struct NotFoundError(String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for NotFoundError {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses. The body is always
/// `{"error": <message>, "kind": <machine-readable kind>}`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(AutopilotError::InvalidInput(msg.into()).into())
    }

    /// Construct a 404 Not Found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self(NotFoundError(msg.into()).into())
    }

    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        if self.0.downcast_ref::<NotFoundError>().is_some() {
            return (StatusCode::NOT_FOUND, "not_found");
        }
        match self.0.downcast_ref::<AutopilotError>() {
            Some(e) => {
                let status = match e {
                    AutopilotError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    AutopilotError::InsufficientSignals { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    AutopilotError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                    AutopilotError::ExecutionFailed(_)
                    | AutopilotError::ConfigNotFound(_)
                    | AutopilotError::Io(_)
                    | AutopilotError::Yaml(_)
                    | AutopilotError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.kind())
            }
            None => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            tracing::warn!(kind, error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
