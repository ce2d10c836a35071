//! Error taxonomy for the admin client.
//!
//! The client core only classifies failures; callers choose the
//! user-facing copy.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`crate::http::ApiClient`] and the repositories.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 4xx other than 401/403/404/409. Never retried.
    #[error("{message}")]
    Validation { status: u16, message: String },

    /// Second 401 on a replayed request, or the refresh cycle failed.
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// 403. Never triggers a refresh.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// 5xx after the retry policy gave up.
    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    /// Connection, timeout or protocol failure below HTTP status level.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// HTTP status behind this error, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Validation { status, .. } => Some(*status),
            ApiError::ServiceUnavailable { status, .. } => Some(*status),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Conflict(_) => Some(409),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, ApiError::SessionExpired(_))
    }
}

/// Map a non-success response to the error taxonomy.
///
/// 401 maps to `SessionExpired`: by the time a caller classifies a 401 the
/// refresh path has already been taken or is not applicable.
pub fn classify(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Unexpected response")
            .to_string()
    });

    match status {
        StatusCode::UNAUTHORIZED => ApiError::SessionExpired(message),
        StatusCode::FORBIDDEN => ApiError::Forbidden(message),
        StatusCode::NOT_FOUND => ApiError::NotFound(message),
        StatusCode::CONFLICT => ApiError::Conflict(message),
        s if s.is_server_error() => ApiError::ServiceUnavailable {
            status: s.as_u16(),
            message,
        },
        s => ApiError::Validation {
            status: s.as_u16(),
            message,
        },
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ..}`, `{"detail": ..}` or `{"error": ..}` (string or
/// nested `{"message": ..}`), otherwise the trimmed raw text.
fn error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for key in ["message", "detail", "error"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
                Some(serde_json::Value::Object(inner)) => {
                    if let Some(serde_json::Value::String(s)) = inner.get("message") {
                        return Some(s.clone());
                    }
                }
                Some(other @ serde_json::Value::Array(_)) => return Some(other.to_string()),
                _ => {}
            }
        }
    }

    Some(trimmed.to_string())
}
