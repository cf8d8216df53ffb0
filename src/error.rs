//! Core error type.
//!
//! One enum serves both library callers and the HTTP facade, mirroring the
//! distinction the wire format draws in its error kinds (see `wire_code`).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("deadlock detected: {0}")]
    Deadlock(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("subsystem unavailable: {0}")]
    Unavailable(String),

    #[error("internal invariant violated: {0}")]
    Fatal(String),
}

pub type AceResult<T> = Result<T, AceError>;

impl AceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn deadlock(msg: impl Into<String>) -> Self {
        Self::Deadlock(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Wire-level name, per spec §7 (parenthesized names).
    pub fn wire_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Deadlock(_) => "deadlock",
            Self::Timeout(_) => "timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::ValidationFailed(_) => "validation_failed",
            Self::Unavailable(_) => "unavailable",
            Self::Fatal(_) => "fatal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Deadlock(_) => StatusCode::LOCKED,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a caller should retry with backoff per §7's policy.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Deadlock(_) | Self::Unavailable(_))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AceError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Fatal(_)) {
            tracing::error!(error = %self, "fatal core error");
        }
        let body = ErrorBody { error: self.wire_code(), message: self.to_string() };
        (self.status(), Json(body)).into_response()
    }
}
