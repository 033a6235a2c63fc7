//! Resource fetcher implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{FetchedResource, ResourceFetcher, RetryPolicy, DEFAULT_MIME_TYPE},
};
use reqwest::{header::CONTENT_TYPE, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based media fetcher
///
/// Provides:
/// - Connection pooling via reqwest
/// - Automatic retry with exponential backoff on 5xx and 429
/// - TLS via rustls
pub struct ReqwestResourceFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl ReqwestResourceFetcher {
    /// Create a fetcher with default timeouts and retry policy
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a fetcher with a custom request timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent("feedcache-core/0.1.0")
            .build()
            .map_err(|e| BridgeError::OperationFailed(format!("HTTP client setup: {}", e)))?;

        Ok(Self::with_client(client))
    }

    /// Wrap a preconfigured client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn is_retryable(status: u16) -> bool {
        status >= 500 || status == 429
    }

    fn mime_type_of(response: &reqwest::Response) -> String {
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
    }

    fn strip_query(url: &str) -> &str {
        url.split(['?', '#']).next().unwrap_or(url)
    }

    async fn fetch_once(&self, url: &str) -> std::result::Result<FetchedResource, (BridgeError, bool)> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let retry = e.is_timeout() || e.is_connect();
                let error = if e.is_timeout() {
                    BridgeError::OperationFailed("Request timed out".to_string())
                } else if e.is_connect() {
                    BridgeError::OperationFailed(format!("Connection failed: {}", e.without_url()))
                } else {
                    BridgeError::OperationFailed(e.without_url().to_string())
                };
                return Err((error, retry));
            }
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let error = BridgeError::HttpStatus {
                status,
                url: Self::strip_query(url).to_string(),
            };
            return Err((error, Self::is_retryable(status)));
        }

        let mime_type = Self::mime_type_of(&response);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| (BridgeError::OperationFailed(e.without_url().to_string()), true))?;

        Ok(FetchedResource { bytes, mime_type })
    }
}

#[async_trait]
impl ResourceFetcher for ReqwestResourceFetcher {
    async fn fetch_resource(&self, url: &str) -> Result<FetchedResource> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                attempt,
                max_attempts,
                url = Self::strip_query(url),
                "Fetching resource"
            );

            match self.fetch_once(url).await {
                Ok(resource) => {
                    debug!(size = resource.len(), mime = %resource.mime_type, "Resource fetched");
                    return Ok(resource);
                }
                Err((error, retryable)) => {
                    if !retryable || attempt >= max_attempts {
                        return Err(error);
                    }
                    warn!(error = %error, attempt, "Fetch failed with retryable error");

                    let delay = self.policy.delay_for_attempt(attempt);
                    debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = ReqwestResourceFetcher::new().unwrap();
        assert_eq!(fetcher.policy.max_attempts, 3);

        let fetcher = fetcher.with_retry_policy(RetryPolicy::no_retry());
        assert_eq!(fetcher.policy.max_attempts, 1);
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(ReqwestResourceFetcher::is_retryable(500));
        assert!(ReqwestResourceFetcher::is_retryable(503));
        assert!(ReqwestResourceFetcher::is_retryable(429));
        assert!(!ReqwestResourceFetcher::is_retryable(404));
        assert!(!ReqwestResourceFetcher::is_retryable(403));
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(
            ReqwestResourceFetcher::strip_query("https://cdn.test/v.mp4?sig=abc"),
            "https://cdn.test/v.mp4"
        );
        assert_eq!(
            ReqwestResourceFetcher::strip_query("https://cdn.test/v.mp4"),
            "https://cdn.test/v.mp4"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_fails() {
        let fetcher = ReqwestResourceFetcher::with_timeout(Duration::from_millis(500))
            .unwrap()
            .with_retry_policy(RetryPolicy::no_retry());

        let result = fetcher.fetch_resource("http://127.0.0.1:1/video.mp4").await;
        assert!(result.is_err());
    }
}
