use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use faultline_core::error::{ErrorKind, ErrorPayload};
use faultline_core::FaultlineError;

pub const ALLOWED_METHODS: &str = "POST, GET, OPTIONS";

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorPayload,
}

impl ErrorEnvelope {
    fn new(error: ErrorPayload) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "handlers naturally own error values from `Result` and pass them through"
)]
pub fn faultline_error_response(err: FaultlineError, operation: &str) -> Response {
    let status = status_for_error(&err);
    match err.kind() {
        ErrorKind::Persistence | ErrorKind::Internal => {
            tracing::error!(operation, error = %err, "request failed");
        }
        _ => tracing::debug!(operation, error = %err, "request rejected"),
    }
    let mut response = (status, Json(ErrorEnvelope::new(err.to_payload(operation)))).into_response();
    if let FaultlineError::RateLimited {
        retry_after_secs, ..
    } = &err
    {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    response
}

pub fn method_not_allowed_response(method: &Method, operation: &str) -> Response {
    let payload = ErrorPayload {
        code: "METHOD_NOT_ALLOWED".to_string(),
        message: "Method not allowed".to_string(),
        operation: operation.to_string(),
        trace_id: Uuid::new_v4().to_string(),
        details: Some(json!({ "method": method.as_str() })),
    };
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, ALLOWED_METHODS)],
        Json(ErrorEnvelope::new(payload)),
    )
        .into_response()
}

fn status_for_error(err: &FaultlineError) -> StatusCode {
    match err {
        FaultlineError::InvalidReport(_) | FaultlineError::Validation(_) => {
            StatusCode::BAD_REQUEST
        }
        FaultlineError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
        FaultlineError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        FaultlineError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        FaultlineError::NotFound(_) => StatusCode::NOT_FOUND,
        FaultlineError::Persistence(_)
        | FaultlineError::Sqlite(_)
        | FaultlineError::Json(_)
        | FaultlineError::Io(_)
        | FaultlineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
