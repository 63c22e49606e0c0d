//! Media relay pipeline
//!
//! Fetches a remote resource on behalf of a client, checks its content type
//! against the media allow-list and, for HLS manifests, rewrites every
//! segment and nested playlist reference so that it is fetched through the
//! relay as well. Used by the HTTP routes in `nekoproxy-api`.

pub mod delivery;
pub mod error;
pub mod gate;
pub mod request;
pub mod rewrite;
pub mod upstream;

use axum::response::Response;
use nekoproxy_core::Config;
use tracing::debug;
use url::Url;

pub use delivery::{deliver, Delivery, MANIFEST_CONTENT_TYPE, SEGMENT_CONTENT_TYPE};
pub use error::{ErrorKind, ProxyError, Result};
pub use gate::MediaAllowList;
pub use request::{parse_target, FetchRequest};
pub use rewrite::{percent_encode, rewrite_manifest, RelayBase};
pub use upstream::{BodyMode, Fetched, UpstreamBody, UpstreamClient};

/// Everything a request needs to relay a resource. Immutable after startup,
/// so one instance is shared by all requests.
#[derive(Clone)]
pub struct Relay {
    upstream: UpstreamClient,
    allow_list: MediaAllowList,
    manifest_types: Vec<String>,
}

impl Relay {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            upstream: UpstreamClient::new(&config.upstream)?,
            allow_list: MediaAllowList::from_config(&config.media),
            manifest_types: config
                .media
                .manifest_types
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        })
    }

    /// Relay an entry resource: probe, gate, fetch, rewrite manifests, deliver.
    ///
    /// The gate runs on the probed type before the full fetch is issued, so a
    /// rejected resource is never downloaded.
    pub async fn relay_entry(&self, request: &FetchRequest, base: &RelayBase) -> Result<Response> {
        let referrer = request.referrer.as_ref();

        let probed = self.upstream.probe(&request.target, referrer).await?;
        let content_type = self.allow_list.admit(probed)?;
        let delivery = Delivery::select(&content_type, &self.manifest_types);

        debug!(
            url = %request.target,
            content_type = %content_type,
            delivery = ?delivery,
            "Relaying entry resource"
        );

        let fetched = self
            .upstream
            .fetch(&request.target, referrer, delivery.body_mode())
            .await?;

        let body = match (delivery, fetched.body) {
            (Delivery::Manifest, UpstreamBody::Text(text)) => {
                UpstreamBody::Text(rewrite_manifest(&text, &fetched.url, base))
            }
            (_, body) => body,
        };

        deliver(delivery, &content_type, body)
    }

    /// Relay a media segment through the keep-alive pool. No gate, no probe.
    pub async fn relay_segment(&self, target: &Url) -> Result<Response> {
        let fetched = self.upstream.fetch_segment(target).await?;
        let content_type = fetched
            .content_type
            .as_deref()
            .unwrap_or(SEGMENT_CONTENT_TYPE);

        debug!(url = %target, content_type = %content_type, "Relaying segment");

        deliver(Delivery::Buffered, content_type, fetched.body)
    }
}
