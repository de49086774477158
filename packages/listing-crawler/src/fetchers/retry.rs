//! Retry-with-backoff wrapper.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::error::FetchResult;
use crate::traits::fetcher::Fetcher;
use crate::types::config::FetchSettings;
use crate::types::page::FetchedPage;

/// Attempt cap and exponential backoff bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(600),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.backoff_base_ms),
            max_delay: Duration::from_millis(settings.backoff_max_ms),
        }
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// capped at `max_delay`, plus up to 50% random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let jitter_ms = (backoff.as_millis() as u64) / 2;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=jitter_ms)
        };
        backoff + Duration::from_millis(jitter)
    }
}

/// Retries transient failures of the inner fetcher.
///
/// Permanent failures return immediately. A transient failure on the last
/// attempt is escalated to permanent.
pub struct RetryingFetcher<F: Fetcher> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        let mut attempt = 1;
        loop {
            match self.inner.fetch(url, timeout).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        url = %url,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.escalate(attempt)),
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
