//! reqwest-backed fetcher.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::error::Error as _;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::error::{ConfigResult, FetchError, FetchResult};
use crate::traits::fetcher::Fetcher;
use crate::types::page::FetchedPage;

/// Browser-like default so listing sites serve their normal markup.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const MAX_REDIRECTS: usize = 5;

/// Plain HTTP GET fetcher. One attempt per call; wrap it in
/// [`RetryingFetcher`](super::RetryingFetcher) for backoff.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with the default browser user agent.
    pub fn new() -> ConfigResult<Self> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> ConfigResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("es-CO,es;q=0.9,en;q=0.5"),
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResult<FetchedPage> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::permanent(url, format!("malformed URL: {e}")))?;

        debug!(url = %url, "HTTP fetch starting");
        let response = self
            .client
            .get(parsed)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "HTTP request failed");
                classify_request_error(url, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::transient(url, format!("failed to read body: {e}")))?;

        debug!(url = %url, final_url = %final_url, bytes = html.len(), "HTTP fetch complete");
        Ok(FetchedPage::new(final_url, html))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// 408 and 429 are worth retrying; every other 4xx is final. 5xx is
/// transient.
pub fn classify_status(url: &str, status: StatusCode) -> FetchError {
    let reason = format!("HTTP {status}");
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        FetchError::transient(url, reason)
    } else {
        FetchError::permanent(url, reason)
    }
}

fn classify_request_error(url: &str, error: &reqwest::Error) -> FetchError {
    let reason = error.to_string();
    if error.is_builder() || error.is_redirect() {
        return FetchError::permanent(url, reason);
    }
    if error.is_timeout() {
        return FetchError::transient(url, format!("timed out: {reason}"));
    }
    if error.is_connect() && is_dns_failure(error) {
        return FetchError::permanent(url, format!("unresolvable host: {reason}"));
    }
    FetchError::transient(url, reason)
}

fn is_dns_failure(error: &reqwest::Error) -> bool {
    let mut source = error.source();
    while let Some(err) = source {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = err.source();
    }
    false
}
