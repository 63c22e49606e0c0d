use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub media: MediaConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub http_port: u16,
    /// Scheme written into relay URLs embedded in rewritten manifests
    pub public_scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            public_scheme: "https".to_string(),
        }
    }
}

/// Outbound HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub connect_timeout_seconds: u64,
    /// Bounds the wait for response headers on every request, and the whole
    /// exchange for buffered fetches. Streamed passthrough bodies are not
    /// bounded by it.
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    pub max_redirects: usize,

    // Keep-alive pool used by the segment relay
    pub segment_pool_max_idle_per_host: usize,
    pub segment_pool_idle_timeout_seconds: u64,
    pub tcp_keepalive_seconds: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 10,
            request_timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            max_redirects: 10,
            segment_pool_max_idle_per_host: 32,
            segment_pool_idle_timeout_seconds: 90,
            tcp_keepalive_seconds: 60,
        }
    }
}

/// Media types the relay is willing to serve
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Content-type prefixes accepted on the entry path
    pub allowed_types: Vec<String>,
    /// Content types treated as HLS manifests and rewritten
    pub manifest_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                "image/".to_string(),
                "video/".to_string(),
                "audio/".to_string(),
                "application/vnd.apple.mpegurl".to_string(),
                "application/x-mpegurl".to_string(),
            ],
            manifest_types: vec![
                "application/vnd.apple.mpegurl".to_string(),
                "application/x-mpegurl".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "pretty"
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // NEKOPROXY_SERVER__HTTP_PORT, NEKOPROXY_MEDIA__ALLOWED_TYPES=image/,video/
        builder = builder.add_source(
            Environment::with_prefix("NEKOPROXY")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("media.allowed_types")
                .with_list_parse_key("media.manifest_types")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from environment variables only (for Docker/K8s)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Load from file path
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    /// Get HTTP address
    #[must_use]
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.http_port)
    }

    /// Check the loaded values, collecting every problem instead of
    /// stopping at the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.http_port == 0 {
            errors.push("server.http_port must be non-zero".to_string());
        }
        if !matches!(self.server.public_scheme.as_str(), "http" | "https") {
            errors.push(format!(
                "server.public_scheme must be \"http\" or \"https\", got {:?}",
                self.server.public_scheme
            ));
        }

        if self.upstream.connect_timeout_seconds == 0 {
            errors.push("upstream.connect_timeout_seconds must be non-zero".to_string());
        }
        if self.upstream.request_timeout_seconds == 0 {
            errors.push("upstream.request_timeout_seconds must be non-zero".to_string());
        }

        if self.media.allowed_types.is_empty() {
            errors.push("media.allowed_types must list at least one media type".to_string());
        }
        if self.media.allowed_types.iter().any(|t| t.trim().is_empty()) {
            errors.push("media.allowed_types must not contain blank entries".to_string());
        }
        for manifest in &self.media.manifest_types {
            let lower = manifest.to_ascii_lowercase();
            let allowed = self
                .media
                .allowed_types
                .iter()
                .any(|prefix| lower.starts_with(&prefix.to_ascii_lowercase()));
            if !allowed {
                errors.push(format!(
                    "media.manifest_types entry {manifest:?} is not covered by media.allowed_types"
                ));
            }
        }

        if !matches!(
            self.logging.level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "warning" | "error"
        ) {
            errors.push(format!("logging.level {:?} is not a known level", self.logging.level));
        }
        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            errors.push(format!(
                "logging.format must be \"json\" or \"pretty\", got {:?}",
                self.logging.format
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
