//! Media-type allow-list

use nekoproxy_core::config::MediaConfig;

use crate::error::{ProxyError, Result};

/// Content-type prefixes the entry path is willing to relay.
///
/// Built once at startup and shared read-only between requests.
#[derive(Debug, Clone)]
pub struct MediaAllowList {
    prefixes: Vec<String>,
}

impl MediaAllowList {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.allowed_types)
    }

    /// Prefix match against every entry; media types compare case-insensitively.
    #[must_use]
    pub fn allows(&self, content_type: &str) -> bool {
        let content_type = content_type.trim_start().to_ascii_lowercase();
        self.prefixes
            .iter()
            .any(|prefix| content_type.starts_with(prefix.as_str()))
    }

    /// Pass a probed content type through the gate. A missing content type is
    /// rejected like any other unlisted type.
    pub fn admit(&self, content_type: Option<String>) -> Result<String> {
        match content_type {
            Some(content_type) if self.allows(&content_type) => Ok(content_type),
            other => Err(ProxyError::UnsupportedMediaType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_list() -> MediaAllowList {
        MediaAllowList::from_config(&MediaConfig::default())
    }

    #[test]
    fn test_prefix_match() {
        let list = default_list();

        assert!(list.allows("image/png"));
        assert!(list.allows("video/mp4"));
        assert!(list.allows("application/vnd.apple.mpegurl"));
        assert!(list.allows("application/vnd.apple.mpegurl; charset=utf-8"));
        assert!(list.allows("Image/JPEG"));

        assert!(!list.allows("text/html"));
        assert!(!list.allows("application/json"));
        // Prefix only: the entry must appear at the start
        assert!(!list.allows("x-image/png"));
    }

    #[test]
    fn test_blank_entries_are_ignored() {
        let list = MediaAllowList::new(["", "  ", "video/"]);

        assert!(list.allows("video/MP2T"));
        assert!(!list.allows("text/plain"));
    }

    #[test]
    fn test_admit() {
        let list = default_list();

        assert_eq!(
            list.admit(Some("image/gif".to_string())).unwrap(),
            "image/gif"
        );
        assert!(matches!(
            list.admit(Some("text/html; charset=utf-8".to_string())),
            Err(ProxyError::UnsupportedMediaType(Some(t))) if t.starts_with("text/html")
        ));
        assert!(matches!(
            list.admit(None),
            Err(ProxyError::UnsupportedMediaType(None))
        ));
    }
}
