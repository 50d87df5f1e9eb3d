//! Loader for tiles served over HTTP.

use std::time::Duration;

use reqwest::StatusCode;

use super::loader::{BoxFuture, LoadOutcome, LoaderError, TileLoader};
use crate::coord::TileKey;
use crate::tile::{TileImage, TileSource};

/// Default request timeout in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Fetches tiles from the source URL template.
///
/// A 404 is reported as missing; any other non-success status or transport
/// error as a failure. Fetched tiles expire after the source's max-age.
pub struct HttpLoader {
    client: reqwest::Client,
}

impl HttpLoader {
    /// Creates a loader with the default timeout.
    pub fn new() -> Result<Self, LoaderError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT_SECS)
    }

    /// Creates a loader with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, LoaderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("tilechain/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LoaderError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get(&self, key: TileKey, source: &TileSource) -> Result<LoadOutcome, LoaderError> {
        let url = source.url_for(key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LoaderError::Http(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(LoadOutcome::Missing);
        }
        if !status.is_success() {
            return Err(LoaderError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| LoaderError::Http(format!("Failed to read response: {}", e)))?;

        Ok(LoadOutcome::Loaded(
            TileImage::new(data).with_max_age(source.max_age),
        ))
    }
}

impl TileLoader for HttpLoader {
    fn name(&self) -> &str {
        "http"
    }

    fn requires_network(&self) -> bool {
        true
    }

    fn load<'a>(&'a self, key: TileKey, source: &'a TileSource) -> BoxFuture<'a, LoadOutcome> {
        Box::pin(async move {
            self.get(key, source)
                .await
                .unwrap_or_else(LoadOutcome::Failed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_loader_requires_network() {
        let loader = HttpLoader::new().unwrap();
        assert!(loader.requires_network());
        assert_eq!(loader.name(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let loader = HttpLoader::with_timeout(1).unwrap();
        let source = TileSource::new("local", "http://127.0.0.1:9/{z}/{x}/{y}.png");
        let key = TileKey::new(1, 0, 0).unwrap();

        assert!(matches!(
            loader.load(key, &source).await,
            LoadOutcome::Failed(LoaderError::Http(_))
        ));
    }
}
