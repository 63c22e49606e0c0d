//! Outbound HTTP client for origin requests
//!
//! Two `reqwest` clients share one configuration: the entry client opens a
//! fresh connection per request, while the segment client keeps a bounded
//! keep-alive pool so that the many small segment fetches of one playback
//! session reuse TCP/TLS connections.
//!
//! Every request must produce response headers within the request timeout.
//! Buffered bodies are bound by the same timeout; streamed bodies are not.

use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use nekoproxy_core::config::UpstreamConfig;
use reqwest::{
    header::{HeaderValue, CONTENT_TYPE, REFERER},
    redirect::Policy,
    Client, Method, Response,
};
use url::Url;

use crate::error::{ProxyError, Result};

/// Upper bound on how much of an upstream error body is kept for logging
const ERROR_EXCERPT_LIMIT: usize = 512;

/// How the body of a full fetch is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Read completely into raw bytes
    Binary,
    /// Read completely and decode as text
    Text,
    /// Hand the body over as a byte stream, chunk by chunk
    Stream,
}

/// Body of a fetched upstream resource
pub enum UpstreamBody {
    Binary(Bytes),
    Text(String),
    Stream(BoxStream<'static, reqwest::Result<Bytes>>),
}

impl std::fmt::Debug for UpstreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binary(bytes) => f.debug_tuple("Binary").field(&bytes.len()).finish(),
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A completed upstream GET
#[derive(Debug)]
pub struct Fetched {
    /// Final URL after redirects
    pub url: Url,
    pub content_type: Option<String>,
    pub body: UpstreamBody,
}

/// Time limit applied to one upstream exchange
#[derive(Debug, Clone, Copy)]
enum Deadline {
    /// Headers and the whole body
    Whole(Duration),
    /// Headers only, plus the error excerpt of a non-2xx reply
    Headers(Duration),
}

/// Client for origin requests
#[derive(Clone)]
pub struct UpstreamClient {
    entry: Client,
    segment: Client,
    request_timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let entry = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .redirect(Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(0)
            .build()
            .map_err(ProxyError::ClientBuild)?;

        let segment = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .redirect(Policy::limited(config.max_redirects))
            .pool_max_idle_per_host(config.segment_pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.segment_pool_idle_timeout_seconds))
            .tcp_keepalive(Duration::from_secs(config.tcp_keepalive_seconds))
            .build()
            .map_err(ProxyError::ClientBuild)?;

        Ok(Self {
            entry,
            segment,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        })
    }

    /// Issue a HEAD request and return the advertised content type.
    pub async fn probe(&self, url: &Url, referrer: Option<&HeaderValue>) -> Result<Option<String>> {
        let response = send(
            &self.entry,
            Method::HEAD,
            url,
            referrer,
            Deadline::Whole(self.request_timeout),
        )
        .await?;

        Ok(content_type(&response))
    }

    /// GET the resource through the entry client, reading the body as `mode` asks.
    pub async fn fetch(
        &self,
        url: &Url,
        referrer: Option<&HeaderValue>,
        mode: BodyMode,
    ) -> Result<Fetched> {
        let deadline = match mode {
            BodyMode::Stream => Deadline::Headers(self.request_timeout),
            BodyMode::Binary | BodyMode::Text => Deadline::Whole(self.request_timeout),
        };
        let response = send(&self.entry, Method::GET, url, referrer, deadline).await?;

        let final_url = response.url().clone();
        let content_type = content_type(&response);
        let body = match mode {
            BodyMode::Binary => UpstreamBody::Binary(
                response
                    .bytes()
                    .await
                    .map_err(|source| request_error(Method::GET, url, source))?,
            ),
            BodyMode::Text => UpstreamBody::Text(
                response
                    .text()
                    .await
                    .map_err(|source| request_error(Method::GET, url, source))?,
            ),
            BodyMode::Stream => UpstreamBody::Stream(response.bytes_stream().boxed()),
        };

        Ok(Fetched {
            url: final_url,
            content_type,
            body,
        })
    }

    /// GET a media segment as raw bytes through the keep-alive pool.
    pub async fn fetch_segment(&self, url: &Url) -> Result<Fetched> {
        let response = send(
            &self.segment,
            Method::GET,
            url,
            None,
            Deadline::Whole(self.request_timeout),
        )
        .await?;

        let final_url = response.url().clone();
        let content_type = content_type(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|source| request_error(Method::GET, url, source))?;

        Ok(Fetched {
            url: final_url,
            content_type,
            body: UpstreamBody::Binary(bytes),
        })
    }
}

async fn send(
    client: &Client,
    method: Method,
    url: &Url,
    referrer: Option<&HeaderValue>,
    deadline: Deadline,
) -> Result<Response> {
    let mut request = client.request(method.clone(), url.clone());

    if let Some(referrer) = referrer {
        request = request.header(REFERER, referrer.clone());
    }
    let limit = match deadline {
        Deadline::Whole(limit) => {
            request = request.timeout(limit);
            limit
        }
        Deadline::Headers(limit) => limit,
    };

    let exchange = async {
        let response = request
            .send()
            .await
            .map_err(|source| request_error(method.clone(), url, source))?;

        if !response.status().is_success() {
            return Err(status_error(method.clone(), url, response).await);
        }

        Ok::<_, ProxyError>(response)
    };

    let outcome = tokio::time::timeout(limit, exchange).await;
    outcome.map_err(|_| ProxyError::Timeout {
        method,
        url: url.to_string(),
        after: limit,
    })?
}

fn request_error(method: Method, url: &Url, source: reqwest::Error) -> ProxyError {
    ProxyError::Request {
        method,
        url: url.to_string(),
        source,
    }
}

async fn status_error(method: Method, url: &Url, mut response: Response) -> ProxyError {
    let status = response.status();
    let headers = response.headers().clone();

    let mut excerpt = Vec::new();
    while excerpt.len() < ERROR_EXCERPT_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => excerpt.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }
    excerpt.truncate(ERROR_EXCERPT_LIMIT);

    ProxyError::Status {
        method,
        url: url.to_string(),
        status,
        headers,
        body_excerpt: String::from_utf8_lossy(&excerpt).into_owned(),
    }
}

fn content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
