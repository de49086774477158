//! Rate-limited fetcher wrapper.
//!
//! Wraps any Fetcher with a global request-rate cap using the governor crate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::page::FetchedPage;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A fetcher wrapper that enforces a requests-per-second cap shared by every
/// worker using it.
pub struct RateLimitedFetcher<F: Fetcher> {
    inner: F,
    limiter: Arc<DefaultRateLimiter>,
}

impl<F: Fetcher> RateLimitedFetcher<F> {
    /// Cap at `requests_per_second`, optionally allowing bursts.
    pub fn new(inner: F, requests_per_second: u32, burst: Option<u32>) -> ConfigResult<Self> {
        let mut quota = Quota::per_second(non_zero("fetch.requests_per_second", requests_per_second)?);
        if let Some(burst) = burst {
            quota = quota.allow_burst(non_zero("fetch.burst", burst)?);
        }
        Ok(Self::with_quota(inner, quota))
    }

    /// Create with a custom quota.
    pub fn with_quota(inner: F, quota: Quota) -> Self {
        Self {
            inner,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

fn non_zero(field: &str, value: u32) -> ConfigResult<NonZeroU32> {
    NonZeroU32::new(value).ok_or_else(|| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: "must be greater than zero".to_string(),
    })
}

#[async_trait]
impl<F: Fetcher> Fetcher for RateLimitedFetcher<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        self.limiter.until_ready().await;
        self.inner.fetch(url, timeout).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use std::time::Instant;

    #[tokio::test]
    async fn test_rate_limiting() {
        let mock = MockFetcher::new()
            .with_page("https://example.com/1", "Page 1")
            .with_page("https://example.com/2", "Page 2")
            .with_page("https://example.com/3", "Page 3");

        // 2 requests per second
        let fetcher = RateLimitedFetcher::new(mock, 2, None).unwrap();

        let start = Instant::now();
        for url in ["https://example.com/1", "https://example.com/2", "https://example.com/3"] {
            fetcher.fetch(url, Duration::from_secs(1)).await.unwrap();
        }
        let elapsed = start.elapsed();

        // First is immediate, 2nd and 3rd wait
        assert!(elapsed.as_millis() >= 500, "Rate limiting not working: {:?}", elapsed);
    }

    #[test]
    fn test_zero_rate_rejected() {
        let result = RateLimitedFetcher::new(MockFetcher::new(), 0, None);
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
