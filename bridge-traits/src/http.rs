//! Resource Fetching Abstraction
//!
//! The only network-facing capability the cache core depends on: fetch the
//! bytes behind a media URL.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// MIME type assumed when the transport does not report one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Bytes retrieved for a URL together with the reported content type.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Bytes,
    pub mime_type: String,
}

impl FetchedResource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Retry policy configuration for transports that retry on their own.
///
/// The cache core never retries a failed fetch; hosts that want retries
/// configure them here, on the transport.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between retries
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub use_exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that performs exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Fetches media bytes by URL.
///
/// Implementations own every transport concern: TLS, timeouts, retries,
/// authentication headers. A non-success HTTP status must be reported as
/// [`BridgeError::HttpStatus`](crate::error::BridgeError::HttpStatus).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::ResourceFetcher;
///
/// async fn warm(fetcher: &dyn ResourceFetcher, url: &str) -> usize {
///     fetcher.fetch_resource(url).await.map(|r| r.len()).unwrap_or(0)
/// }
/// ```
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Retrieve the full resource behind `url`.
    async fn fetch_resource(&self, url: &str) -> Result<FetchedResource>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_resource_builder() {
        let resource = FetchedResource::new(Bytes::from_static(b"abc")).with_mime_type("video/mp4");

        assert_eq!(resource.len(), 3);
        assert!(!resource.is_empty());
        assert_eq!(resource.mime_type, "video/mp4");
    }

    #[test]
    fn test_default_mime_type() {
        let resource = FetchedResource::new(Vec::<u8>::new());
        assert!(resource.is_empty());
        assert_eq!(resource.mime_type, DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_retry_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(30));

        let flat = RetryPolicy {
            use_exponential_backoff: false,
            ..RetryPolicy::default()
        };
        assert_eq!(flat.delay_for_attempt(5), Duration::from_millis(100));
        assert_eq!(RetryPolicy::no_retry().max_attempts, 1);
    }
}
