//! Metadata server client.

use std::time::Duration;

use thiserror::Error;

/// Root of the compute metadata API.
pub const METADATA_URL: &str = "http://metadata.google.internal/computeMetadata/v1";

const METADATA_FLAVOR: (&str, &str) = ("Metadata-Flavor", "Google");

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("metadata server returned {0}")]
    Status(reqwest::StatusCode),
}

/// Reads single values from the metadata server.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl MetadataClient {
    pub fn new() -> Self {
        Self::with_base_url(METADATA_URL)
    }

    /// Point the client at another server (tests, emulators).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(2),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `path` (relative to the API root) and return the trimmed body.
    pub async fn get(&self, path: &str) -> Result<String, MetadataError> {
        self.get_with_query(path, &[]).await
    }

    /// Like [`get`](Self::get), appending URL-encoded `query` parameters.
    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<String, MetadataError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let mut request = self.http.get(&url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request
            .header(METADATA_FLAVOR.0, METADATA_FLAVOR.1)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status(status));
        }

        let body = response.text().await?;
        tracing::trace!(path, "Metadata value fetched");
        Ok(body.trim().to_string())
    }
}

impl Default for MetadataClient {
    fn default() -> Self {
        Self::new()
    }
}
