//! Frontier bookkeeping for one crawl run.
//!
//! All mutable crawl state lives in [`CrawlState`], which the scheduler keeps
//! behind a single mutex. The visited check and the budget check happen in
//! one call ([`CrawlState::try_enqueue`]), so two workers can never both
//! claim the same URL or overrun `max_urls`.

use std::collections::{HashSet, VecDeque};

use crate::canonical::CanonicalUrl;
use crate::types::record::ExtractedRecord;
use crate::types::summary::{CrawlOutcome, CrawlSummary};

/// A URL waiting to be fetched, with its discovery distance from a seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: CanonicalUrl,
    pub depth: u32,
}

/// FIFO queue of entries; each entry is popped exactly once.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: FrontierEntry) {
        self.queue.push_back(entry);
    }

    pub fn pop(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Canonical URLs already fetched or enqueued. Only grows.
#[derive(Debug, Default)]
pub struct VisitedSet {
    urls: HashSet<CanonicalUrl>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, returning `true` if the URL was not yet present.
    pub fn insert(&mut self, url: CanonicalUrl) -> bool {
        self.urls.insert(url)
    }

    pub fn contains(&self, url: &CanonicalUrl) -> bool {
        self.urls.contains(url)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Accepted records, unique by canonical link, in insertion order.
#[derive(Debug, Default)]
pub struct ResultSet {
    records: Vec<ExtractedRecord>,
    links: HashSet<CanonicalUrl>,
}

impl ResultSet {
    pub fn contains(&self, link: &CanonicalUrl) -> bool {
        self.links.contains(link)
    }

    /// Append unless a record with the same link is already present.
    pub fn insert(&mut self, record: ExtractedRecord) -> bool {
        if !self.links.insert(record.link.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ExtractedRecord> {
        self.records
    }
}

/// Outcome of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueue {
    Accepted,
    AlreadySeen,
    BudgetExhausted,
}

/// Everything a run mutates. Created fresh for every run.
#[derive(Debug)]
pub struct CrawlState {
    visited: VisitedSet,
    /// Record links whose retention decision belongs to some worker
    claimed_records: HashSet<CanonicalUrl>,
    max_urls: usize,
    pub deep_frontier: Frontier,
    pub results: ResultSet,
    pub summary: CrawlSummary,
}

impl CrawlState {
    pub fn new(max_urls: usize) -> Self {
        Self {
            visited: VisitedSet::new(),
            claimed_records: HashSet::new(),
            max_urls,
            deep_frontier: Frontier::new(),
            results: ResultSet::default(),
            summary: CrawlSummary::default(),
        }
    }

    /// Claim `url` for fetching if it is unseen and the budget allows.
    pub fn try_enqueue(&mut self, url: &CanonicalUrl) -> Enqueue {
        if self.visited.contains(url) {
            return Enqueue::AlreadySeen;
        }
        if self.summary.urls_enqueued >= self.max_urls {
            self.summary.budget_exhausted = true;
            return Enqueue::BudgetExhausted;
        }
        self.visited.insert(url.clone());
        self.summary.urls_enqueued += 1;
        Enqueue::Accepted
    }

    /// Claim `url` and queue it for the deep-crawl phase.
    pub fn enqueue_deep(&mut self, url: CanonicalUrl, depth: u32) -> Enqueue {
        let outcome = self.try_enqueue(&url);
        if outcome == Enqueue::Accepted {
            self.deep_frontier.push(FrontierEntry { url, depth });
        }
        outcome
    }

    /// Take ownership of the retention decision for a record link.
    ///
    /// Returns `false` if the link was already claimed, whether it ended up
    /// accepted or rejected. Each link is decided exactly once per run.
    pub fn claim_record(&mut self, link: &CanonicalUrl) -> bool {
        if self.claimed_records.contains(link) {
            return false;
        }
        self.claimed_records.insert(link.clone())
    }

    /// Record a URL reached through a redirect so it is not fetched again.
    /// Does not count against the budget.
    pub fn mark_visited(&mut self, url: CanonicalUrl) {
        self.visited.insert(url);
    }

    pub fn is_visited(&self, url: &CanonicalUrl) -> bool {
        self.visited.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn into_outcome(self) -> CrawlOutcome {
        CrawlOutcome {
            records: self.results.into_records(),
            summary: self.summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn canon(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s)
    }

    #[test]
    fn test_enqueue_dedupes_equivalent_urls() {
        let mut state = CrawlState::new(10);
        assert_eq!(state.try_enqueue(&canon("https://x.com/a?b=1&a=2")), Enqueue::Accepted);
        assert_eq!(state.try_enqueue(&canon("https://x.com/a/?a=2&b=1#f")), Enqueue::AlreadySeen);
        assert_eq!(state.summary.urls_enqueued, 1);
    }

    #[test]
    fn test_budget_caps_enqueues() {
        let mut state = CrawlState::new(2);
        assert_eq!(state.try_enqueue(&canon("https://x.com/1")), Enqueue::Accepted);
        assert_eq!(state.try_enqueue(&canon("https://x.com/2")), Enqueue::Accepted);
        assert_eq!(state.try_enqueue(&canon("https://x.com/3")), Enqueue::BudgetExhausted);
        assert!(state.summary.budget_exhausted);
        assert!(!state.is_visited(&canon("https://x.com/3")));
        // Already-seen wins over budget.
        assert_eq!(state.try_enqueue(&canon("https://x.com/1")), Enqueue::AlreadySeen);
    }

    #[test]
    fn test_deep_frontier_is_fifo() {
        let mut state = CrawlState::new(10);
        state.enqueue_deep(canon("https://x.com/1"), 1);
        state.enqueue_deep(canon("https://x.com/2"), 1);
        state.enqueue_deep(canon("https://x.com/1"), 2);

        assert_eq!(state.deep_frontier.len(), 2);
        assert_eq!(state.deep_frontier.pop().unwrap().url, canon("https://x.com/1"));
        assert_eq!(state.deep_frontier.pop().unwrap().url, canon("https://x.com/2"));
        assert!(state.deep_frontier.pop().is_none());
    }

    #[test]
    fn test_mark_visited_is_free() {
        let mut state = CrawlState::new(1);
        state.mark_visited(canon("https://x.com/final"));
        assert_eq!(state.summary.urls_enqueued, 0);
        assert_eq!(state.try_enqueue(&canon("https://x.com/final")), Enqueue::AlreadySeen);
        assert_eq!(state.visited_count(), 1);
    }

    #[test]
    fn test_record_claimed_once() {
        let mut state = CrawlState::new(10);
        assert!(state.claim_record(&canon("https://x.com/a")));
        assert!(!state.claim_record(&canon("https://x.com/a/#top")));
        // Claims are independent of the fetch budget and visited set.
        assert_eq!(state.summary.urls_enqueued, 0);
        assert!(!state.is_visited(&canon("https://x.com/a")));
    }

    #[test]
    fn test_result_set_unique_links() {
        let mut results = ResultSet::default();
        let now = Utc::now();
        assert!(results.insert(ExtractedRecord::new("a", canon("https://x.com/a"), now)));
        assert!(!results.insert(ExtractedRecord::new("b", canon("https://x.com/a/"), now)));
        assert_eq!(results.len(), 1);
        assert!(results.contains(&canon("https://x.com/a")));
        assert_eq!(results.into_records()[0].title, "a");
    }
}
