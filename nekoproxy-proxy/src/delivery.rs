//! Response delivery strategies

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};

use crate::error::Result;
use crate::upstream::{BodyMode, UpstreamBody};

/// Content type of every rewritten manifest
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
/// Content type of a segment whose origin did not send one
pub const SEGMENT_CONTENT_TYPE: &str = "video/MP2T";

/// How an entry resource is handed to the client, chosen once per request
/// from the probed content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Read as text, rewrite, send buffered
    Manifest,
    /// Read as bytes, send buffered
    Buffered,
    /// Forward upstream chunks as they arrive
    Streamed,
}

impl Delivery {
    /// `manifest_types` must already be lowercase.
    #[must_use]
    pub fn select(content_type: &str, manifest_types: &[String]) -> Self {
        let content_type = content_type.to_ascii_lowercase();

        if manifest_types
            .iter()
            .any(|manifest| content_type.contains(manifest.as_str()))
        {
            Self::Manifest
        } else if content_type.starts_with("image/") {
            Self::Buffered
        } else {
            Self::Streamed
        }
    }

    #[must_use]
    pub const fn body_mode(self) -> BodyMode {
        match self {
            Self::Manifest => BodyMode::Text,
            Self::Buffered => BodyMode::Binary,
            Self::Streamed => BodyMode::Stream,
        }
    }
}

/// Build the client response for a fetched (and possibly rewritten) body.
pub fn deliver(delivery: Delivery, content_type: &str, body: UpstreamBody) -> Result<Response> {
    let content_type = match delivery {
        Delivery::Manifest => MANIFEST_CONTENT_TYPE,
        Delivery::Buffered | Delivery::Streamed => content_type,
    };

    let body = match body {
        UpstreamBody::Binary(bytes) => Body::from(bytes),
        UpstreamBody::Text(text) => Body::from(text),
        UpstreamBody::Stream(stream) => Body::from_stream(stream),
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, "inline")
        .header(header::CONNECTION, "keep-alive")
        .body(body)?)
}
