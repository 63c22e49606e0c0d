// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nekoproxy_proxy::{ErrorKind, ProxyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Map a relay failure to its client-facing status. Upstream details are
    /// logged here and replaced by `upstream_message` in the response.
    pub fn relay(err: ProxyError, upstream_message: &str) -> Self {
        match err.kind() {
            ErrorKind::Validation => {
                tracing::debug!(error = %err, "Rejected relay request");
                let message = match err {
                    ProxyError::MissingUrl => "No URL provided",
                    ProxyError::InvalidReferrer(_) => "Invalid referrer provided",
                    _ => "Invalid URL provided",
                };
                Self::bad_request(message)
            }
            ErrorKind::UnsupportedType => {
                tracing::warn!(error = %err, "Refusing to relay resource");
                Self::unsupported_media_type("Unsupported media type")
            }
            ErrorKind::Upstream => {
                log_upstream_failure(&err);
                Self::internal_server_error(upstream_message)
            }
        }
    }
}

fn log_upstream_failure(err: &ProxyError) {
    match err {
        ProxyError::Status {
            method,
            url,
            status,
            headers,
            body_excerpt,
        } => {
            tracing::error!(
                method = %method,
                url = %url,
                status = %status,
                headers = ?headers,
                response = %body_excerpt,
                "Upstream returned an error status"
            );
        }
        ProxyError::Request { method, url, source } => {
            tracing::error!(
                method = %method,
                url = %url,
                error = %source,
                "Upstream request failed"
            );
        }
        ProxyError::Timeout { method, url, after } => {
            tracing::error!(
                method = %method,
                url = %url,
                after = ?after,
                "Upstream timed out"
            );
        }
        other => {
            tracing::error!(error = %other, "Relay failed");
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err = AppError::relay(ProxyError::MissingUrl, "Failed to proxy content");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No URL provided");

        let err = AppError::relay(
            ProxyError::InvalidUrl("ftp://x".to_string()),
            "Failed to proxy content",
        );
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid URL provided");
    }

    #[test]
    fn test_unsupported_type() {
        let err = AppError::relay(
            ProxyError::UnsupportedMediaType(Some("text/html".to_string())),
            "Failed to proxy content",
        );
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.message, "Unsupported media type");
    }

    #[test]
    fn test_upstream_details_are_not_echoed() {
        let err = AppError::relay(
            ProxyError::Status {
                method: axum::http::Method::GET,
                url: "https://origin.example/secret?token=abc".to_string(),
                status: StatusCode::BAD_GATEWAY,
                headers: axum::http::HeaderMap::new(),
                body_excerpt: "stack trace".to_string(),
            },
            "Failed to proxy video segment",
        );
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Failed to proxy video segment");
    }
}
