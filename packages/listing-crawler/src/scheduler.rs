//! Crawl scheduler.
//!
//! Each seed listing runs as a sequential loop
//! (`fetch -> extract -> paginate`) and up to `concurrency` listings run at
//! once. With `deep` enabled, same-site links discovered along the way are
//! queued and crawled breadth-first after the listings finish.
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_crawler::{build_fetcher, CrawlConfig, CrawlScheduler};
//!
//! let config = CrawlConfig::from_path("crawl.json")?;
//! let fetcher = build_fetcher(&config.fetch)?;
//! let outcome = CrawlScheduler::new(fetcher, config)?.run().await;
//! println!("{}", outcome.report());
//! ```

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::canonical::{canonicalize_with, CanonicalUrl};
use crate::dates::{parse_date, DateParseResult};
use crate::dom::compile_selector;
use crate::error::ConfigResult;
use crate::extractor::{resolve_link, ExtractionContext, RecordExtractor};
use crate::frontier::{CrawlState, Enqueue};
use crate::pagination::{NextPage, PaginationResolver};
use crate::traits::fetcher::Fetcher;
use crate::types::config::{CrawlConfig, FetchSettings, Seed};
use crate::types::page::FetchedPage;
use crate::types::record::{DetailFields, ExtractedRecord};
use crate::types::summary::CrawlOutcome;

/// Consecutive listing pages without a new record before a listing stops.
const MAX_EMPTY_PAGES: u32 = 2;

enum Fetched {
    Page(FetchedPage),
    Failed,
    Cancelled,
}

/// What a listing page yielded, computed before any further `.await` so the
/// parsed document never lives across a suspension point.
struct ListingScan {
    records: Vec<ExtractedRecord>,
    next: Option<NextPage>,
    links: Vec<CanonicalUrl>,
}

/// Jittered pause between consecutive fetches of one worker.
struct Pacer {
    min_ms: u64,
    max_ms: u64,
    started: bool,
}

impl Pacer {
    fn new(settings: &FetchSettings) -> Self {
        Self {
            min_ms: settings.min_delay_ms,
            max_ms: settings.max_delay_ms,
            started: false,
        }
    }

    /// Returns `false` if cancelled while waiting.
    async fn wait(&mut self, cancel: &CancellationToken) -> bool {
        if !self.started || self.max_ms == 0 {
            self.started = true;
            return !cancel.is_cancelled();
        }
        let ms = if self.max_ms > self.min_ms {
            fastrand::u64(self.min_ms..=self.max_ms)
        } else {
            self.min_ms
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_millis(ms)) => true,
        }
    }
}

/// Drives one crawl run over a [`Fetcher`].
pub struct CrawlScheduler<F: Fetcher> {
    fetcher: F,
    config: CrawlConfig,
    extractor: RecordExtractor,
    resolver: PaginationResolver,
    anchor: Selector,
    seed_hosts: HashSet<String>,
}

impl<F: Fetcher> CrawlScheduler<F> {
    /// Validate `config` and compile its selectors.
    pub fn new(fetcher: F, config: CrawlConfig) -> ConfigResult<Self> {
        config.validate()?;

        let seed_hosts = config
            .seeds
            .iter()
            .filter_map(|seed| Url::parse(&seed.url).ok())
            .filter_map(|url| url.host_str().map(site_host))
            .collect();

        Ok(Self {
            extractor: RecordExtractor::from_config(&config.extractor)?,
            resolver: PaginationResolver::from_config(&config.pagination, config.duplicate_keys)?,
            anchor: compile_selector("anchor", "a[href]")?,
            seed_hosts,
            fetcher,
            config,
        })
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Run to completion.
    pub async fn run(&self) -> CrawlOutcome {
        self.run_with_cancel(CancellationToken::new()).await
    }

    /// Run until done or until `cancel` fires.
    ///
    /// Cancellation stops dequeuing and abandons in-flight fetches; the
    /// records accepted so far are returned with `summary.cancelled` set.
    pub async fn run_with_cancel(&self, cancel: CancellationToken) -> CrawlOutcome {
        info!(
            seeds = self.config.seeds.len(),
            concurrency = self.config.concurrency,
            deep = self.config.deep,
            enrich = self.config.enrich_details,
            max_urls = self.config.budget.max_urls,
            "Starting crawl"
        );

        let state = Mutex::new(CrawlState::new(self.config.budget.max_urls));

        stream::iter(self.config.seeds.iter())
            .for_each_concurrent(self.config.concurrency, |seed| {
                let state = &state;
                let cancel = &cancel;
                async move { self.crawl_listing(seed, state, cancel).await }
            })
            .await;

        if self.config.deep && !cancel.is_cancelled() {
            self.crawl_deep(&state, &cancel).await;
        }

        let mut state = state.into_inner();
        state.summary.cancelled = cancel.is_cancelled();

        let summary = &state.summary;
        info!(
            accepted = summary.records_accepted,
            rejected = summary.records_rejected,
            pages = summary.pages_fetched,
            failed = summary.failed_count(),
            enqueued = summary.urls_enqueued,
            cancelled = summary.cancelled,
            "Crawl finished"
        );
        state.into_outcome()
    }

    async fn crawl_listing(&self, seed: &Seed, state: &Mutex<CrawlState>, cancel: &CancellationToken) {
        let mut current = self.canonical(&seed.url);
        let claimed = state.lock().await.try_enqueue(&current);
        if claimed != Enqueue::Accepted {
            debug!(seed = %current, outcome = ?claimed, "Seed skipped");
            return;
        }

        info!(seed = %current, "Crawling listing");
        let mut pacer = Pacer::new(&self.config.fetch);
        let mut pages = 0usize;
        let mut empty_streak = 0u32;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let page = match self.fetch(&current, state, cancel, &mut pacer).await {
                Fetched::Page(page) => page,
                Fetched::Failed | Fetched::Cancelled => break,
            };
            pages += 1;

            let scan = self.scan_listing(&page, &current, seed);

            // Claiming here makes this worker the only one to enrich and
            // judge each link; repeats on later pages or listings are skipped.
            let candidates: Vec<ExtractedRecord> = {
                let mut state = state.lock().await;
                scan.records
                    .into_iter()
                    .filter(|record| state.claim_record(&record.link))
                    .collect()
            };
            let novel = candidates.len();
            debug!(url = %current, page = pages, novel, "Listing page extracted");

            for mut record in candidates {
                if self.config.enrich_details
                    && !self.enrich(&mut record, state, cancel, &mut pacer).await
                {
                    break;
                }
                self.finalize(record, state).await;
            }

            if self.follows_links(0) {
                let mut state = state.lock().await;
                for link in scan.links {
                    state.enqueue_deep(link, 1);
                }
            }

            empty_streak = if novel == 0 { empty_streak + 1 } else { 0 };
            if empty_streak >= MAX_EMPTY_PAGES {
                debug!(seed = %seed.url, pages, "Listing exhausted: consecutive empty pages");
                break;
            }
            if pages >= self.config.budget.max_pages_per_listing {
                debug!(seed = %seed.url, pages, "Listing page budget reached");
                break;
            }
            let Some(next) = scan.next else {
                break;
            };

            let next_url = self.canonical(next.url.as_str());
            let claimed = state.lock().await.try_enqueue(&next_url);
            match claimed {
                Enqueue::Accepted => current = next_url,
                Enqueue::AlreadySeen | Enqueue::BudgetExhausted => {
                    debug!(next = %next_url, outcome = ?claimed, "Pagination stopped");
                    break;
                }
            }
        }

        state.lock().await.summary.listings_completed += 1;
    }

    async fn crawl_deep(&self, state: &Mutex<CrawlState>, cancel: &CancellationToken) {
        let mut pacer = Pacer::new(&self.config.fetch);

        loop {
            if cancel.is_cancelled() {
                break;
            }
            let Some(entry) = state.lock().await.deep_frontier.pop() else {
                break;
            };

            let page = match self.fetch(&entry.url, state, cancel, &mut pacer).await {
                Fetched::Page(page) => page,
                Fetched::Failed => continue,
                Fetched::Cancelled => break,
            };

            let (record, links) = self.scan_deep(&page, &entry.url, self.follows_links(entry.depth));
            if !links.is_empty() {
                let mut state = state.lock().await;
                for link in links {
                    state.enqueue_deep(link, entry.depth + 1);
                }
            }
            if let Some(record) = record {
                let claimed = state.lock().await.claim_record(&record.link);
                if claimed {
                    self.finalize(record, state).await;
                }
            }
        }
    }

    /// Fetch the record's own page and overwrite its fields with what the
    /// page provides. Returns `false` only when cancelled.
    async fn enrich(
        &self,
        record: &mut ExtractedRecord,
        state: &Mutex<CrawlState>,
        cancel: &CancellationToken,
        pacer: &mut Pacer,
    ) -> bool {
        let claimed = state.lock().await.try_enqueue(&record.link);
        if claimed != Enqueue::Accepted {
            debug!(url = %record.link, outcome = ?claimed, "Detail enrichment skipped");
            return true;
        }

        let link = record.link.clone();
        match self.fetch(&link, state, cancel, pacer).await {
            Fetched::Page(page) => {
                let fields = self.detail_fields(&page, &link);
                record.enrich(fields);
                true
            }
            Fetched::Failed => true,
            Fetched::Cancelled => false,
        }
    }

    /// Parse the date, apply retention, and append to the result set.
    async fn finalize(&self, mut record: ExtractedRecord, state: &Mutex<CrawlState>) {
        let date = record
            .published_raw
            .as_deref()
            .map(parse_date)
            .unwrap_or_else(DateParseResult::unknown);
        record.published = date.value;
        let keep = self.config.retention.keep(&record, &date);

        let mut state = state.lock().await;
        if !keep {
            debug!(url = %record.link, date = ?date.value, "Record rejected by retention policy");
            state.summary.records_rejected += 1;
            return;
        }
        if state.results.insert(record) {
            state.summary.records_accepted += 1;
        }
    }

    async fn fetch(
        &self,
        url: &CanonicalUrl,
        state: &Mutex<CrawlState>,
        cancel: &CancellationToken,
        pacer: &mut Pacer,
    ) -> Fetched {
        if !pacer.wait(cancel).await {
            return Fetched::Cancelled;
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(url = %url, "Fetch abandoned: cancelled");
                return Fetched::Cancelled;
            }
            result = self.fetcher.fetch(url.as_str(), self.config.fetch.timeout()) => result,
        };

        let mut state = state.lock().await;
        match result {
            Ok(page) => {
                state.summary.pages_fetched += 1;
                let final_url = self.canonical(&page.final_url);
                if &final_url != url {
                    state.mark_visited(final_url);
                }
                Fetched::Page(page)
            }
            Err(e) => {
                warn!(url = %url, error = %e, fetcher = self.fetcher.name(), "Fetch failed");
                state.summary.failed_urls.push(url.to_string());
                Fetched::Failed
            }
        }
    }

    fn scan_listing(&self, page: &FetchedPage, requested: &CanonicalUrl, seed: &Seed) -> ListingScan {
        let Some(base) = page_base(page, requested) else {
            return ListingScan {
                records: Vec::new(),
                next: None,
                links: Vec::new(),
            };
        };

        let document = Html::parse_document(&page.html);
        let ctx = ExtractionContext::new(base.clone())
            .with_default_location(seed.location.clone())
            .with_duplicate_keys(self.config.duplicate_keys);

        ListingScan {
            records: self.extractor.extract_all(&document, &ctx),
            next: self.resolver.next_page(&base, &document),
            links: if self.follows_links(0) {
                self.discover_links(&document, &base)
            } else {
                Vec::new()
            },
        }
    }

    fn scan_deep(
        &self,
        page: &FetchedPage,
        requested: &CanonicalUrl,
        collect_links: bool,
    ) -> (Option<ExtractedRecord>, Vec<CanonicalUrl>) {
        let Some(base) = page_base(page, requested) else {
            return (None, Vec::new());
        };

        let document = Html::parse_document(&page.html);
        let ctx = ExtractionContext::new(base.clone()).with_duplicate_keys(self.config.duplicate_keys);
        let record = self.extractor.detail_record(&document, &ctx);
        let links = if collect_links {
            self.discover_links(&document, &base)
        } else {
            Vec::new()
        };
        (Some(record), links)
    }

    fn detail_fields(&self, page: &FetchedPage, requested: &CanonicalUrl) -> DetailFields {
        let Some(base) = page_base(page, requested) else {
            return DetailFields::default();
        };
        let document = Html::parse_document(&page.html);
        let ctx = ExtractionContext::new(base).with_duplicate_keys(self.config.duplicate_keys);
        self.extractor.extract_detail(&document, &ctx)
    }

    /// Same-site links allowed by the path filters, deduplicated, in
    /// document order.
    fn discover_links(&self, document: &Html, base: &Url) -> Vec<CanonicalUrl> {
        let mut seen = HashSet::new();
        document
            .select(&self.anchor)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_link(href, base))
            .filter(|url| {
                url.host_str()
                    .map(|host| self.seed_hosts.contains(&site_host(host)))
                    .unwrap_or(false)
            })
            .filter(|url| self.config.follow.allows(url))
            .map(|url| self.canonical(url.as_str()))
            .filter(|canon| seen.insert(canon.clone()))
            .collect()
    }

    /// Whether links found at `depth` should be queued at `depth + 1`.
    fn follows_links(&self, depth: u32) -> bool {
        self.config.deep && depth < self.config.budget.max_depth
    }

    fn canonical(&self, raw: &str) -> CanonicalUrl {
        canonicalize_with(raw, None, self.config.duplicate_keys)
    }
}

/// URL that relative links on `page` resolve against.
fn page_base(page: &FetchedPage, requested: &CanonicalUrl) -> Option<Url> {
    Url::parse(&page.final_url)
        .ok()
        .or_else(|| requested.to_url())
}

/// Host with any leading `www.` removed, for same-site comparison.
fn site_host(host: &str) -> String {
    host.trim_start_matches("www.").to_ascii_lowercase()
}
