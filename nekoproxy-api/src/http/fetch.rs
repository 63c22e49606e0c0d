//! Relay endpoints
//!
//! `GET /fetch` relays an entry resource (manifest or media), rewriting HLS
//! manifests so that everything they reference is fetched through this
//! server. `GET /fetch/segment` relays media segments.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, Uri},
    response::Response,
    routing::get,
    Router,
};
use nekoproxy_proxy::{parse_target, FetchRequest, RelayBase};
use serde::Deserialize;

use crate::http::{AppError, AppResult, AppState};

const ENTRY_FAILURE: &str = "Failed to proxy content";
const SEGMENT_FAILURE: &str = "Failed to proxy video segment";

/// Build the relay routes
pub fn create_fetch_router() -> Router<AppState> {
    Router::new()
        .route("/fetch", get(fetch_entry))
        .route("/fetch/segment", get(fetch_segment))
}

#[derive(Debug, Default, Deserialize)]
pub struct FetchQuery {
    pub url: Option<String>,
    #[serde(rename = "ref")]
    pub referrer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SegmentQuery {
    pub url: Option<String>,
}

/// GET /fetch?url=<url>&ref=<referrer>
async fn fetch_entry(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    query: Result<Query<FetchQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| {
        tracing::debug!(error = %e, "Malformed query string");
        AppError::bad_request("No URL provided")
    })?;

    let request = FetchRequest::parse(query.url.as_deref(), query.referrer.as_deref())
        .map_err(|e| AppError::relay(e, ENTRY_FAILURE))?;

    let host = request_host(&headers, &uri)
        .ok_or_else(|| AppError::bad_request("Missing Host header"))?;
    let base = RelayBase::new(&state.public_scheme, &host);

    tracing::info!(url = %request.target, "Relaying entry resource");

    state
        .relay
        .relay_entry(&request, &base)
        .await
        .map_err(|e| AppError::relay(e, ENTRY_FAILURE))
}

/// GET /fetch/segment?url=<url>
async fn fetch_segment(
    State(state): State<AppState>,
    query: Result<Query<SegmentQuery>, QueryRejection>,
) -> AppResult<Response> {
    let Query(query) = query.map_err(|e| {
        tracing::debug!(error = %e, "Malformed query string");
        AppError::bad_request("No URL provided")
    })?;

    let target =
        parse_target(query.url.as_deref()).map_err(|e| AppError::relay(e, SEGMENT_FAILURE))?;

    state
        .relay
        .relay_segment(&target)
        .await
        .map_err(|e| AppError::relay(e, SEGMENT_FAILURE))
}

/// Host the client used to reach us: the `Host` header, or the request URI
/// authority for HTTP/2 requests that carry none.
fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(ToString::to_string))
        .filter(|host| !host.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_request_host_prefers_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("relay.example.org:8443"));
        let uri: Uri = "https://other.example/fetch?url=x".parse().unwrap();

        assert_eq!(
            request_host(&headers, &uri).as_deref(),
            Some("relay.example.org:8443")
        );
    }

    #[test]
    fn test_request_host_falls_back_to_authority() {
        let uri: Uri = "https://relay.example.org/fetch?url=x".parse().unwrap();
        assert_eq!(
            request_host(&HeaderMap::new(), &uri).as_deref(),
            Some("relay.example.org")
        );

        let relative: Uri = "/fetch?url=x".parse().unwrap();
        assert!(request_host(&HeaderMap::new(), &relative).is_none());
    }
}
