//! Document retrieval.
//!
//! The pipeline only needs "give me the bytes behind this URL", so retrieval
//! sits behind the `Fetcher` trait. `HttpFetcher` is the production
//! implementation; tests substitute instrumented fetchers.

use crate::error::ScanError;
use crate::types::ScanConfig;
use async_trait::async_trait;
use std::time::Duration;

/// Retrieves the full body of a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the complete response body.
    ///
    /// Any error abandons the task for that URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ScanError>;
}

/// HTTP(S) fetcher backed by a shared `reqwest::Client`.
///
/// Any response that arrives with a readable body is returned, whatever its
/// status code: error pages are scanned like any other document.
#[derive(Clone)]
pub struct HttpFetcher {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    /// Create a fetcher with default settings and no deadline.
    pub fn new() -> Result<Self, ScanError> {
        Self::with_config(&ScanConfig::default())
    }

    /// Create a fetcher honoring the user agent and timeout of `config`.
    pub fn with_config(config: &ScanConfig) -> Result<Self, ScanError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout);
        }

        let http_client = builder
            .build()
            .map_err(|e| ScanError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            timeout: config.timeout,
        })
    }

    async fn fetch_body(&self, url: &str) -> Result<Vec<u8>, ScanError> {
        let response = self.http_client.get(url).send().await?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ScanError> {
        match self.timeout {
            // The deadline covers connect, headers and the whole body.
            Some(limit) => tokio::time::timeout(limit, self.fetch_body(url))
                .await
                .map_err(|_| ScanError::timeout(format!("fetch {}", url), limit))?,
            None => self.fetch_body(url).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_fetch_error() {
        let fetcher = HttpFetcher::new().unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(err.is_task_scoped(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_refused_connection_is_fetch_error() {
        let fetcher = HttpFetcher::with_config(
            &ScanConfig::default().with_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        // Port 1 is reserved and not listening on loopback.
        let err = fetcher.fetch("http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.is_task_scoped(), "unexpected error: {:?}", err);
    }
}
