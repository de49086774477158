//! Fetched page type.

use serde::{Deserialize, Serialize};

/// HTML returned by a [`Fetcher`](crate::traits::fetcher::Fetcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Raw HTML body
    pub html: String,

    /// URL after redirects; relative links on the page resolve against it
    pub final_url: String,
}

impl FetchedPage {
    pub fn new(final_url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            final_url: final_url.into(),
        }
    }

    /// Check if this page has any body content.
    pub fn has_content(&self) -> bool {
        !self.html.trim().is_empty()
    }
}
