//! M3U8 rewriting
//!
//! References are found by file extension on whitespace-delimited tokens.
//! Tag syntax is not parsed, so a URI inside a quoted attribute value
//! (`#EXT-X-KEY:URI="..."`) is left as it is.

use std::sync::LazyLock;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use url::Url;

/// Extension of a media segment reference
pub const SEGMENT_EXTENSION: &str = ".ts";
/// Extension of a nested playlist reference
pub const MANIFEST_EXTENSION: &str = ".m3u8";

/// RFC 3986 unreserved characters stay as they are, everything else is escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+").expect("token pattern is valid"));

/// What a manifest token points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Segment,
    Manifest,
}

impl Reference {
    /// Classify a token by the extension of its path part (before `?` or `#`).
    #[must_use]
    pub fn classify(token: &str) -> Option<Self> {
        let path = token.split(['?', '#']).next().unwrap_or(token);

        if has_extension(path, SEGMENT_EXTENSION) {
            Some(Self::Segment)
        } else if has_extension(path, MANIFEST_EXTENSION) {
            Some(Self::Manifest)
        } else {
            None
        }
    }
}

fn has_extension(path: &str, extension: &str) -> bool {
    let (path, extension) = (path.as_bytes(), extension.as_bytes());
    path.len() > extension.len()
        && path[path.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

/// Relay endpoints on the host that served the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayBase {
    fetch: String,
    segment: String,
}

impl RelayBase {
    #[must_use]
    pub fn new(scheme: &str, host: &str) -> Self {
        Self {
            fetch: format!("{scheme}://{host}/fetch?url="),
            segment: format!("{scheme}://{host}/fetch/segment?url="),
        }
    }

    /// Relay URL for a nested manifest
    #[must_use]
    pub fn fetch_url(&self, absolute: &str) -> String {
        format!("{}{}", self.fetch, percent_encode(absolute))
    }

    /// Relay URL for a media segment
    #[must_use]
    pub fn segment_url(&self, absolute: &str) -> String {
        format!("{}{}", self.segment, percent_encode(absolute))
    }

    fn relay_url(&self, reference: Reference, absolute: &str) -> String {
        match reference {
            Reference::Segment => self.segment_url(absolute),
            Reference::Manifest => self.fetch_url(absolute),
        }
    }
}

/// Rewrite every segment and nested-manifest reference in `manifest` into a
/// relay URL. References are resolved against `source_url` first; all other
/// text, whitespace included, is copied through unchanged.
#[must_use]
pub fn rewrite_manifest(manifest: &str, source_url: &Url, base: &RelayBase) -> String {
    TOKEN
        .replace_all(manifest, |caps: &Captures<'_>| {
            let token = &caps[0];
            let Some(reference) = Reference::classify(token) else {
                return token.to_string();
            };

            match source_url.join(token) {
                Ok(absolute) => base.relay_url(reference, absolute.as_str()),
                Err(e) => {
                    tracing::debug!(token, error = %e, "Leaving unresolvable manifest reference");
                    token.to_string()
                }
            }
        })
        .into_owned()
}

/// Percent-encode a value for use in a URL query parameter
#[must_use]
pub fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, QUERY_VALUE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEDIA_PLAYLIST: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
/other/seg1.ts
#EXTINF:9.5,
https://cdn2.example.com/abs/seg2.ts
#EXT-X-ENDLIST
";

    const MASTER_PLAYLIST: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2400000,RESOLUTION=1280x720
https://cdn.example.com/live/720p/index.m3u8
";

    fn source() -> Url {
        Url::parse("https://cdn.example.com/live/stream.m3u8").unwrap()
    }

    fn base() -> RelayBase {
        RelayBase::new("https", "relay.example.org")
    }

    #[test]
    fn test_percent_encode() {
        assert_eq!(
            percent_encode("https://cdn.example.com/a b/seg-1_x~.ts?k=v&x=1"),
            "https%3A%2F%2Fcdn.example.com%2Fa%20b%2Fseg-1_x~.ts%3Fk%3Dv%26x%3D1"
        );
        assert_eq!(percent_encode("é"), "%C3%A9");
    }

    #[test]
    fn test_relay_base_urls() {
        let base = base();
        assert_eq!(
            base.segment_url("https://a.example/s.ts"),
            "https://relay.example.org/fetch/segment?url=https%3A%2F%2Fa.example%2Fs.ts"
        );
        assert_eq!(
            base.fetch_url("https://a.example/v.m3u8"),
            "https://relay.example.org/fetch?url=https%3A%2F%2Fa.example%2Fv.m3u8"
        );
    }

    #[test]
    fn test_classify() {
        assert_eq!(Reference::classify("seg.ts"), Some(Reference::Segment));
        assert_eq!(Reference::classify("SEG.TS"), Some(Reference::Segment));
        assert_eq!(
            Reference::classify("seg.ts?token=abc#t=1"),
            Some(Reference::Segment)
        );
        assert_eq!(Reference::classify("v/index.m3u8"), Some(Reference::Manifest));
        assert_eq!(Reference::classify("index.m3u8?x=y.ts"), Some(Reference::Manifest));
        assert_eq!(Reference::classify(".ts"), None);
        assert_eq!(Reference::classify("#EXTINF:10.0,"), None);
        assert_eq!(Reference::classify("stats.json"), None);
        assert_eq!(Reference::classify("#EXT-X-MAP:URI=\"init.ts\""), None);
    }

    #[test]
    fn test_rewrite_media_playlist() {
        let rewritten = rewrite_manifest(MEDIA_PLAYLIST, &source(), &base());

        let expected = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:10.0,
https://relay.example.org/fetch/segment?url=https%3A%2F%2Fcdn.example.com%2Flive%2Fseg0.ts
#EXTINF:10.0,
https://relay.example.org/fetch/segment?url=https%3A%2F%2Fcdn.example.com%2Fother%2Fseg1.ts
#EXTINF:9.5,
https://relay.example.org/fetch/segment?url=https%3A%2F%2Fcdn2.example.com%2Fabs%2Fseg2.ts
#EXT-X-ENDLIST
";
        assert_eq!(rewritten, expected);
    }

    #[test]
    fn test_rewrite_master_playlist_routes_variants_through_fetch() {
        let rewritten = rewrite_manifest(MASTER_PLAYLIST, &source(), &base());

        let lines: Vec<&str> = rewritten.lines().collect();
        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(
            lines[1],
            "#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360"
        );
        assert_eq!(
            lines[2],
            "https://relay.example.org/fetch?url=https%3A%2F%2Fcdn.example.com%2Flive%2F360p%2Findex.m3u8"
        );
        assert_eq!(
            lines[4],
            "https://relay.example.org/fetch?url=https%3A%2F%2Fcdn.example.com%2Flive%2F720p%2Findex.m3u8"
        );
        assert!(!rewritten.contains("/fetch/segment"));
    }

    #[test]
    fn test_relative_and_absolute_references_resolve_identically() {
        let relative = rewrite_manifest("seg0.ts", &source(), &base());
        let absolute = rewrite_manifest(
            "https://cdn.example.com/live/seg0.ts",
            &source(),
            &base(),
        );
        let dotted = rewrite_manifest("../live/./seg0.ts", &source(), &base());

        assert_eq!(relative, absolute);
        assert_eq!(relative, dotted);
    }

    #[test]
    fn test_each_reference_is_rewritten_once() {
        let rewritten = rewrite_manifest(MEDIA_PLAYLIST, &source(), &base());

        assert_eq!(rewritten.matches("/fetch/segment?url=").count(), 3);
        // The encoded value must not be wrapped a second time
        assert!(!rewritten.contains("%252F"));
    }

    #[test]
    fn test_query_string_stays_inside_the_encoded_url() {
        let rewritten = rewrite_manifest("seg0.ts?token=abc&exp=1", &source(), &base());

        assert_eq!(
            rewritten,
            "https://relay.example.org/fetch/segment?url=https%3A%2F%2Fcdn.example.com%2Flive%2Fseg0.ts%3Ftoken%3Dabc%26exp%3D1"
        );
    }

    #[test]
    fn test_non_reference_content_is_untouched() {
        let manifest = "#EXTM3U\r\n#EXT-X-KEY:METHOD=AES-128,URI=\"key.ts\"\r\n\r\n  # comment\tline  \r\n";
        assert_eq!(rewrite_manifest(manifest, &source(), &base()), manifest);
    }

    #[test]
    fn test_whitespace_around_references_is_preserved() {
        let rewritten = rewrite_manifest("  seg0.ts\t\r\n", &source(), &base());

        assert!(rewritten.starts_with("  https://relay.example.org/fetch/segment?url="));
        assert!(rewritten.ends_with("seg0.ts\t\r\n"));
    }
}
