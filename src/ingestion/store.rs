//! Object store backends for the raw bookings file

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default timeout for object downloads
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300;

/// Source of raw objects addressed by bucket and object name
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn fetch(&self, bucket: &str, object: &str) -> Result<Vec<u8>>;

    /// Human-readable location, for logs
    fn describe(&self, bucket: &str, object: &str) -> String;
}

/// Public object URLs of the form `{endpoint}/{bucket}/{object}`
pub struct HttpStore {
    endpoint: Url,
    client: reqwest::Client,
}

impl HttpStore {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_FETCH_TIMEOUT_SECS)
    }

    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PipelineError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        match endpoint.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(PipelineError::Config(format!(
                    "unsupported endpoint scheme '{}', expected http or https",
                    scheme
                )))
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| PipelineError::Acquisition(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { endpoint, client })
    }

    /// Object URL with each path segment percent-encoded
    pub fn object_url(&self, bucket: &str, object: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| PipelineError::Config(format!("endpoint '{}' cannot carry a path", self.endpoint)))?
            .pop_if_empty()
            .push(bucket)
            .push(object);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn fetch(&self, bucket: &str, object: &str) -> Result<Vec<u8>> {
        let url = self.object_url(bucket, object)?;
        debug!(url = %url, "Downloading object");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| PipelineError::Acquisition(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Acquisition(format!("{} returned HTTP {}", url, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PipelineError::Acquisition(format!("failed to read body from {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    fn describe(&self, bucket: &str, object: &str) -> String {
        self.object_url(bucket, object)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}/{}/{}", self.endpoint, bucket, object))
    }
}

/// Offline store: objects are files directly under a directory and the
/// bucket name is ignored
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn fetch(&self, _bucket: &str, object: &str) -> Result<Vec<u8>> {
        let path = self.root.join(object);
        tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::Acquisition(format!("failed to read {}: {}", path.display(), e)))
    }

    fn describe(&self, _bucket: &str, object: &str) -> String {
        self.root.join(object).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url() {
        let store = HttpStore::new("https://storage.googleapis.com").unwrap();
        let url = store.object_url("my-bucket", "Hotel Reservations.csv").unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/my-bucket/Hotel%20Reservations.csv"
        );

        let store = HttpStore::new("http://localhost:9000/gcs/").unwrap();
        let url = store.object_url("b", "raw.csv").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/gcs/b/raw.csv");
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(matches!(HttpStore::new("ftp://example.com"), Err(PipelineError::Config(_))));
        assert!(matches!(HttpStore::new("not a url"), Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_local_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bookings.csv"), "a,b\n1,2\n").unwrap();

        let store = LocalStore::new(dir.path());
        let bytes = store.fetch("ignored", "bookings.csv").await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");

        let err = store.fetch("ignored", "missing.csv").await.unwrap_err();
        assert!(matches!(err, PipelineError::Acquisition(_)));
    }
}
