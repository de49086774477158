//! Fetcher trait: the crawler's only way to reach the network.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::FetchResult;
use crate::types::page::FetchedPage;

/// Retrieves the HTML of one URL.
///
/// Implementations classify failures as transient (timeouts, 5xx, resets)
/// or permanent (4xx, unresolvable hosts, malformed URLs). Retrying is the
/// implementation's concern; the scheduler never retries.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url`, giving up after `timeout`.
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        (**self).fetch(url, timeout).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        (**self).fetch(url, timeout).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
