//! Mock fetcher for testing.
//!
//! Serves canned HTML keyed by canonical URL, injects failures, and records
//! every request so tests can assert on fetch counts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::canonical::CanonicalUrl;
use crate::error::{FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::page::FetchedPage;

#[derive(Debug, Clone, Copy, Default)]
struct FailurePlan {
    transient_remaining: u32,
    permanent: bool,
}

#[derive(Debug, Clone)]
struct CannedPage {
    final_url: String,
    html: String,
}

/// Mock fetcher for testing.
///
/// Unknown URLs fail permanently with `HTTP 404`.
///
/// # Example
///
/// ```rust
/// use listing_crawler::testing::MockFetcher;
///
/// let mock = MockFetcher::new()
///     .with_page("https://example.com/", "<h1>Hello</h1>")
///     .with_transient_failures("https://example.com/", 1);
/// assert_eq!(mock.call_count(), 0);
/// ```
#[derive(Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<CanonicalUrl, CannedPage>>>,
    failures: Arc<RwLock<HashMap<CanonicalUrl, FailurePlan>>>,
    calls: Arc<RwLock<Vec<String>>>,
    cancel_after: Arc<RwLock<Option<(usize, CancellationToken)>>>,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn add_page(&self, url: &str, html: impl Into<String>) {
        self.pages.write().unwrap().insert(
            CanonicalUrl::parse(url),
            CannedPage {
                final_url: url.to_string(),
                html: html.into(),
            },
        );
    }

    pub fn with_page(self, url: &str, html: impl Into<String>) -> Self {
        self.add_page(url, html);
        self
    }

    /// Serve `html` for `url` as if the server redirected to `final_url`.
    pub fn with_redirect(self, url: &str, final_url: &str, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(
            CanonicalUrl::parse(url),
            CannedPage {
                final_url: final_url.to_string(),
                html: html.into(),
            },
        );
        self
    }

    /// Fail the next `count` requests for `url` transiently.
    pub fn with_transient_failures(self, url: &str, count: u32) -> Self {
        self.failures
            .write()
            .unwrap()
            .entry(CanonicalUrl::parse(url))
            .or_default()
            .transient_remaining = count;
        self
    }

    /// Fail every request for `url` permanently.
    pub fn with_permanent_failure(self, url: &str) -> Self {
        self.failures
            .write()
            .unwrap()
            .entry(CanonicalUrl::parse(url))
            .or_default()
            .permanent = true;
        self
    }

    /// Cancel `token` once `count` requests have completed.
    pub fn cancel_after(self, count: usize, token: CancellationToken) -> Self {
        *self.cancel_after.write().unwrap() = Some((count, token));
        self
    }

    /// Sleep before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requested URLs, in order, as given by the caller.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// Number of requests whose canonical form equals that of `url`.
    pub fn fetch_count(&self, url: &str) -> usize {
        let target = CanonicalUrl::parse(url);
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|called| CanonicalUrl::parse(called) == target)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn respond(&self, url: &str) -> FetchResult<FetchedPage> {
        let key = CanonicalUrl::parse(url);

        if let Some(plan) = self.failures.write().unwrap().get_mut(&key) {
            if plan.permanent {
                return Err(FetchError::permanent(url, "HTTP 410"));
            }
            if plan.transient_remaining > 0 {
                plan.transient_remaining -= 1;
                return Err(FetchError::transient(url, "HTTP 503"));
            }
        }

        match self.pages.read().unwrap().get(&key) {
            Some(page) => Ok(FetchedPage::new(page.final_url.clone(), page.html.clone())),
            None => Err(FetchError::permanent(url, "HTTP 404")),
        }
    }
}

impl Clone for MockFetcher {
    fn clone(&self) -> Self {
        Self {
            pages: Arc::clone(&self.pages),
            failures: Arc::clone(&self.failures),
            calls: Arc::clone(&self.calls),
            cancel_after: Arc::clone(&self.cancel_after),
            delay: self.delay,
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> FetchResult<FetchedPage> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let count = {
            let mut calls = self.calls.write().unwrap();
            calls.push(url.to_string());
            calls.len()
        };
        let result = self.respond(url);

        if let Some((limit, token)) = self.cancel_after.read().unwrap().as_ref() {
            if count >= *limit {
                token.cancel();
            }
        }
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Builder for mock crawl scenarios.
pub struct MockFetcherBuilder {
    mock: MockFetcher,
}

impl MockFetcherBuilder {
    pub fn new() -> Self {
        Self {
            mock: MockFetcher::new(),
        }
    }

    /// Add a page with raw HTML.
    pub fn page(self, url: &str, html: &str) -> Self {
        self.mock.add_page(url, html);
        self
    }

    /// Add a page wrapping `body` in a minimal HTML document.
    pub fn body(self, url: &str, body: &str) -> Self {
        self.mock
            .add_page(url, format!("<html><head></head><body>{body}</body></html>"));
        self
    }

    pub fn build(self) -> MockFetcher {
        self.mock
    }
}

impl Default for MockFetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
