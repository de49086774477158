//! Bounded Listing Crawler
//!
//! Crawls search-result listing pages of classified/real-estate style sites,
//! follows their pagination, optionally enriches each result from its own
//! detail page, and returns a deduplicated, date-filtered list of structured
//! records.
//!
//! # Design
//!
//! - Heuristics over site adapters: every field is read through an ordered
//!   selector-fallback chain configured in JSON
//! - URLs are compared by canonical form, so nothing is fetched twice
//! - Every run is bounded by a URL budget, a depth limit, and a per-listing
//!   page cap
//! - Cancellation returns whatever was accepted so far
//!
//! # Usage
//!
//! ```rust,ignore
//! use listing_crawler::{build_fetcher, CrawlConfig, CrawlScheduler, OutputFormat};
//!
//! let config = CrawlConfig::from_path("crawl.json")?;
//! let fetcher = build_fetcher(&config.fetch)?;
//! let outcome = CrawlScheduler::new(fetcher, config)?.run().await;
//!
//! let json = listing_crawler::sinks::render(OutputFormat::Json, &outcome.records)?;
//! ```
//!
//! # Modules
//!
//! - [`canonical`] - URL canonicalization
//! - [`dates`] - Spanish/English publication-date parsing
//! - [`extractor`] - Listing-card and detail-page record extraction
//! - [`pagination`] - Next-page resolution strategies
//! - [`scheduler`] - The crawl loop, budget and cancellation
//! - [`fetchers`] - HTTP fetcher with retry and rate limiting
//! - [`sinks`] - JSON, JSON Lines and CSV output
//! - [`testing`] - Mock fetcher for tests

pub mod canonical;
pub mod dates;
pub mod dom;
pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod frontier;
pub mod pagination;
pub mod retention;
pub mod scheduler;
pub mod sinks;
pub mod testing;
pub mod text;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use canonical::{canonicalize, canonicalize_with, CanonicalUrl, DuplicateKeyPolicy};
pub use dates::{find_date, parse_date, DateConfidence, DateLocator, DateParseResult};
pub use error::{
    ConfigError, ConfigResult, CrawlError, FailureKind, FetchError, FetchResult, Result, SinkError,
    SinkResult,
};
pub use extractor::{ExtractionContext, RecordExtractor};
pub use pagination::{NextPage, PaginationResolver, PaginationStrategy};
pub use retention::RetentionPolicy;
pub use scheduler::CrawlScheduler;
pub use traits::fetcher::Fetcher;
pub use types::{
    config::{
        CrawlBudget, CrawlConfig, DetailConfig, ExtractorConfig, FetchSettings, FieldRule,
        LinkFilter, PaginationConfig, Seed,
    },
    page::FetchedPage,
    record::{DetailFields, ExtractedRecord, RecordKind},
    summary::{CrawlOutcome, CrawlReport, CrawlSummary},
};

// Re-export fetchers
pub use fetchers::{
    build_fetcher, FetcherExt, HttpFetcher, RateLimitedFetcher, RetryPolicy, RetryingFetcher,
};

// Re-export sinks
pub use sinks::{CsvSink, JsonLinesSink, JsonSink, OutputFormat, RecordSink};

// Re-export testing utilities
pub use testing::{MockFetcher, MockFetcherBuilder};
