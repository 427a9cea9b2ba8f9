use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, FaultlineError>;

/// A single schema violation found while validating an error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FaultlineError {
    #[error("invalid error report: {}", summarize_issues(.0))]
    InvalidReport(Vec<FieldIssue>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication required: {0}")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limit exceeded for {key}")]
    RateLimited { key: String, retry_after_secs: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    RateLimit,
    NotFound,
    Persistence,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub operation: String,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FaultlineError {
    pub fn lock_poisoned(name: &str) -> Self {
        Self::Internal(format!("{name} lock poisoned"))
    }

    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("{context}: {err}"))
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReport(_) | Self::Validation(_) => ErrorKind::Validation,
            Self::Unauthenticated(_) | Self::PermissionDenied(_) => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimit,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Persistence(_) | Self::Sqlite(_) => ErrorKind::Persistence,
            Self::Json(_) | Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidReport(_) | Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthenticated(_) => "UNAUTHORIZED",
            Self::PermissionDenied(_) => "FORBIDDEN",
            Self::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Persistence(_) | Self::Sqlite(_) => "PERSISTENCE_ERROR",
            Self::Json(_) | Self::Io(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to hand to a remote caller. Storage and internal failures
    /// are reduced to a fixed sentence; the full text belongs in the log.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Persistence => "storage operation failed".to_string(),
            ErrorKind::Internal => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn to_payload(&self, operation: impl Into<String>) -> ErrorPayload {
        let details = match self {
            Self::InvalidReport(issues) => Some(serde_json::json!({ "issues": issues })),
            Self::RateLimited {
                retry_after_secs, ..
            } => Some(serde_json::json!({ "retry_after_secs": retry_after_secs })),
            _ => None,
        };
        ErrorPayload {
            code: self.code().to_string(),
            message: self.public_message(),
            operation: operation.into(),
            trace_id: Uuid::new_v4().to_string(),
            details,
        }
    }
}

fn summarize_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}
