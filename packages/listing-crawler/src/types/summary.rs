//! Run summary and report types.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::record::ExtractedRecord;

/// Counters for one crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlSummary {
    /// Successful fetches (listing, detail and deep pages)
    pub pages_fetched: usize,

    /// URLs whose fetch failed permanently
    pub failed_urls: Vec<String>,

    /// Frontier entries enqueued, seeds included
    pub urls_enqueued: usize,

    pub records_accepted: usize,

    /// Records dropped by the retention policy
    pub records_rejected: usize,

    pub listings_completed: usize,

    /// The run was stopped by a cancellation signal
    pub cancelled: bool,

    /// At least one URL was skipped because `max_urls` was reached
    pub budget_exhausted: bool,
}

impl CrawlSummary {
    pub fn failed_count(&self) -> usize {
        self.failed_urls.len()
    }
}

/// Result of a run: the accepted records in discovery order plus counters.
///
/// A cancelled run still produces a valid outcome holding everything
/// accepted before the signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub records: Vec<ExtractedRecord>,
    pub summary: CrawlSummary,
}

impl CrawlOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Per-category and per-location breakdown of the records.
    pub fn report(&self) -> CrawlReport {
        CrawlReport::from_outcome(self)
    }
}

/// Counts by category and location, largest first; ties keep first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlReport {
    pub total: usize,
    pub by_category: IndexMap<String, usize>,
    pub by_location: IndexMap<String, usize>,
    pub summary: CrawlSummary,
}

impl CrawlReport {
    pub fn from_outcome(outcome: &CrawlOutcome) -> Self {
        let mut by_category = IndexMap::new();
        let mut by_location = IndexMap::new();
        for record in &outcome.records {
            *by_category.entry(label(&record.category)).or_insert(0) += 1;
            *by_location.entry(label(&record.location)).or_insert(0) += 1;
        }
        by_category.sort_by(|_, a, _, b| b.cmp(a));
        by_location.sort_by(|_, a, _, b| b.cmp(a));

        Self {
            total: outcome.records.len(),
            by_category,
            by_location,
            summary: outcome.summary.clone(),
        }
    }
}

fn label(value: &str) -> String {
    if value.trim().is_empty() {
        "(none)".to_string()
    } else {
        value.to_string()
    }
}

impl fmt::Display for CrawlReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Records: {}", self.total)?;
        writeln!(f, "By category:")?;
        for (category, count) in &self.by_category {
            writeln!(f, "  {category}: {count}")?;
        }
        writeln!(f, "By location:")?;
        for (location, count) in &self.by_location {
            writeln!(f, "  {location}: {count}")?;
        }
        write!(
            f,
            "Pages fetched: {}, failed: {}, rejected by date: {}",
            self.summary.pages_fetched,
            self.summary.failed_count(),
            self.summary.records_rejected
        )
    }
}
