//! Fetcher implementations.
//!
//! - `HttpFetcher` - single-attempt reqwest GET
//! - `RetryingFetcher` - exponential backoff for transient failures
//! - `RateLimitedFetcher` - global requests-per-second cap

mod http;
mod rate_limited;
mod retry;

pub use http::{classify_status, HttpFetcher, DEFAULT_USER_AGENT};
pub use rate_limited::RateLimitedFetcher;
pub use retry::{RetryPolicy, RetryingFetcher};

use std::sync::Arc;

use crate::error::ConfigResult;
use crate::traits::fetcher::Fetcher;
use crate::types::config::FetchSettings;

/// Extension trait for composing fetchers.
pub trait FetcherExt: Fetcher + Sized {
    /// Retry transient failures with backoff.
    fn with_retry(self, policy: RetryPolicy) -> RetryingFetcher<Self> {
        RetryingFetcher::new(self, policy)
    }

    /// Cap the request rate.
    fn rate_limited(self, requests_per_second: u32, burst: Option<u32>) -> ConfigResult<RateLimitedFetcher<Self>> {
        RateLimitedFetcher::new(self, requests_per_second, burst)
    }
}

impl<F: Fetcher + Sized> FetcherExt for F {}

/// Build the production fetch stack described by `settings`:
/// HTTP, wrapped in retry, wrapped in the optional rate cap.
pub fn build_fetcher(settings: &FetchSettings) -> ConfigResult<Arc<dyn Fetcher>> {
    let http = match &settings.user_agent {
        Some(agent) => HttpFetcher::with_user_agent(agent)?,
        None => HttpFetcher::new()?,
    };
    let retrying = http.with_retry(RetryPolicy::from_settings(settings));

    Ok(match settings.requests_per_second {
        Some(rps) => Arc::new(retrying.rate_limited(rps, settings.burst)?),
        None => Arc::new(retrying),
    })
}
