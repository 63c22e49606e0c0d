// Relay Error Types

use std::time::Duration;

use reqwest::{header::HeaderMap, Method, StatusCode};

/// How a [`ProxyError`] is reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing request parameters; no upstream call was made
    Validation,
    /// The probed content type is missing or not on the allow-list
    UnsupportedType,
    /// Anything that went wrong talking to the origin or building the reply
    Upstream,
}

/// Errors produced by the relay pipeline
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid referrer: {0}")]
    InvalidReferrer(String),

    #[error("Unsupported media type: {}", .0.as_deref().unwrap_or("<none>"))]
    UnsupportedMediaType(Option<String>),

    #[error("{method} {url} failed: {source}")]
    Request {
        method: Method,
        url: String,
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}")]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        headers: HeaderMap,
        body_excerpt: String,
    },

    #[error("{method} {url} timed out after {after:?}")]
    Timeout {
        method: Method,
        url: String,
        after: Duration,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

impl ProxyError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingUrl | Self::InvalidUrl(_) | Self::InvalidReferrer(_) => {
                ErrorKind::Validation
            }
            Self::UnsupportedMediaType(_) => ErrorKind::UnsupportedType,
            Self::Request { .. }
            | Self::Status { .. }
            | Self::Timeout { .. }
            | Self::ClientBuild(_)
            | Self::Response(_) => ErrorKind::Upstream,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
