//! Client configuration.
//!
//! Every knob the client needs lives in [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The same config is shared by the HTTP client,
//! the status poller and the presenter so that a single value controls, for
//! example, both the upload-size check and the server's advertised limit.

use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Upload limit enforced locally before any request: 100 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Configuration for a translation client session.
///
/// # Example
/// ```rust
/// use pdftranslate_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .base_url("http://translate.internal:8000")
///     .poll_interval(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert_eq!(config.base_url, "http://translate.internal:8000");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL of the API server, without the `/api` suffix.
    /// Default: `http://localhost:8000`.
    pub base_url: String,

    /// Interval between status polls. Default: 1 s.
    ///
    /// Polling is fixed-interval with no backoff; ticks that fire while a
    /// previous request is still in flight are skipped.
    pub poll_interval: Duration,

    /// Timeout for ordinary JSON requests, in seconds. Default: 30.
    pub request_timeout_secs: u64,

    /// Timeout for the multipart upload, in seconds. Default: 300.
    pub upload_timeout_secs: u64,

    /// Timeout for a single result download, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Maximum accepted file size in bytes. Default: 100 MiB.
    pub max_upload_bytes: u64,

    /// How long an error banner stays visible. Default: 5 s.
    pub error_banner_ttl: Duration,

    /// How long a success banner stays visible. Default: 3 s.
    pub success_banner_ttl: Duration,

    /// How long an informational banner (e.g. cancellation) stays visible.
    /// Default: 3 s.
    pub info_banner_ttl: Duration,

    /// Fetch results from their object-storage `access_url` when the task
    /// result carries one. Default: true.
    pub prefer_storage_download: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(1),
            request_timeout_secs: 30,
            upload_timeout_secs: 300,
            download_timeout_secs: 120,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            error_banner_ttl: Duration::from_secs(5),
            success_banner_ttl: Duration::from_secs(3),
            info_banner_ttl: Duration::from_secs(3),
            prefer_storage_download: true,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    /// Join an API path (`/api/...`) onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn error_banner_ttl(mut self, ttl: Duration) -> Self {
        self.config.error_banner_ttl = ttl;
        self
    }

    pub fn success_banner_ttl(mut self, ttl: Duration) -> Self {
        self.config.success_banner_ttl = ttl;
        self
    }

    pub fn info_banner_ttl(mut self, ttl: Duration) -> Self {
        self.config.info_banner_ttl = ttl;
        self
    }

    pub fn prefer_storage_download(mut self, v: bool) -> Self {
        self.config.prefer_storage_download = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let c = &self.config;
        let url = reqwest::Url::parse(&c.base_url).map_err(|e| {
            ClientError::InvalidConfig(format!("base URL '{}' is invalid: {e}", c.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "base URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if c.poll_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ClientError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_server_contract() {
        let c = ClientConfig::default();
        assert_eq!(c.poll_interval, Duration::from_secs(1));
        assert_eq!(c.max_upload_bytes, 104_857_600);
        assert_eq!(c.error_banner_ttl, Duration::from_secs(5));
        assert_eq!(c.success_banner_ttl, Duration::from_secs(3));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let c = ClientConfig::builder()
            .base_url("http://host:9000/")
            .build()
            .unwrap();
        assert_eq!(c.endpoint("/api/health"), "http://host:9000/api/health");
    }

    #[test]
    fn rejects_non_http_scheme() {
        let err = ClientConfig::builder()
            .base_url("ftp://host")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn rejects_zero_poll_interval() {
        assert!(ClientConfig::builder()
            .poll_interval(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn rejects_garbage_url() {
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
    }
}
