use reqwest::header::HeaderValue;
use url::Url;

use crate::error::{ProxyError, Result};

/// A validated relay request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub target: Url,
    /// Sent verbatim as `Referer` on every upstream request
    pub referrer: Option<HeaderValue>,
}

impl FetchRequest {
    /// Validate raw query parameters. Nothing touches the network here.
    pub fn parse(url: Option<&str>, referrer: Option<&str>) -> Result<Self> {
        let target = parse_target(url)?;

        let referrer = match referrer.filter(|r| !r.is_empty()) {
            Some(raw) => Some(
                HeaderValue::from_str(raw)
                    .map_err(|_| ProxyError::InvalidReferrer(raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Self { target, referrer })
    }
}

/// Parse the `url` query parameter into an absolute http(s) URL.
pub fn parse_target(url: Option<&str>) -> Result<Url> {
    let raw = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or(ProxyError::MissingUrl)?;

    let target = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(format!("{raw}: {e}")))?;

    if matches!(target.scheme(), "http" | "https") && target.has_host() {
        Ok(target)
    } else {
        Err(ProxyError::InvalidUrl(format!(
            "{raw}: only absolute http(s) URLs can be relayed"
        )))
    }
}
