//! Crawl configuration.
//!
//! Everything site-specific (seeds, selector lists, keyword tables) is data
//! loaded from JSON. Every field except `seeds` has a default, so a minimal
//! file is just `{"seeds": ["https://..."]}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::canonical::DuplicateKeyPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::extractor::RecordExtractor;
use crate::pagination::PaginationResolver;
use crate::retention::RetentionPolicy;

/// A listing entry point.
///
/// Accepts either a bare URL string or `{"url": ..., "location": ...}` in
/// JSON. `location` becomes the default location label for records found
/// under this seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SeedRepr")]
pub struct Seed {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedRepr {
    Url(String),
    Full {
        url: String,
        #[serde(default)]
        location: Option<String>,
    },
}

impl From<SeedRepr> for Seed {
    fn from(repr: SeedRepr) -> Self {
        match repr {
            SeedRepr::Url(url) => Seed {
                url,
                location: None,
            },
            SeedRepr::Full { url, location } => Seed { url, location },
        }
    }
}

impl Seed {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Limits for one run. Immutable once the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlBudget {
    /// Deepest discovery distance followed in deep mode (seeds are depth 0)
    pub max_depth: u32,

    /// Total frontier entries that may ever be enqueued
    pub max_urls: usize,

    /// Listing pages fetched per seed
    pub max_pages_per_listing: usize,
}

impl Default for CrawlBudget {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_urls: 500,
            max_pages_per_listing: 50,
        }
    }
}

/// A CSS selector plus what to read from the matched element.
///
/// In JSON a bare string means "read the element text"; an object names an
/// attribute: `{"css": "img", "attr": "src"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldRuleRepr")]
pub struct FieldRule {
    pub css: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldRuleRepr {
    Text(String),
    Full {
        css: String,
        #[serde(default)]
        attr: Option<String>,
    },
}

impl From<FieldRuleRepr> for FieldRule {
    fn from(repr: FieldRuleRepr) -> Self {
        match repr {
            FieldRuleRepr::Text(css) => FieldRule { css, attr: None },
            FieldRuleRepr::Full { css, attr } => FieldRule { css, attr },
        }
    }
}

impl FieldRule {
    pub fn text(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: None,
        }
    }

    pub fn attr(css: impl Into<String>, attr: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            attr: Some(attr.into()),
        }
    }
}

fn texts(selectors: &[&str]) -> Vec<FieldRule> {
    selectors.iter().map(|s| FieldRule::text(*s)).collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Selector chains and keyword tables for record extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Card containers on listing pages; the first selector that matches
    /// anything is used
    pub containers: Vec<String>,

    /// When no container selector matches, use the nearest
    /// `article/li/div/section` ancestor of each link
    pub anchor_fallback: bool,

    pub title: Vec<FieldRule>,
    pub link: Vec<FieldRule>,
    pub image: Vec<FieldRule>,
    pub description: Vec<FieldRule>,

    /// Explicit category markup, tried before keyword inference
    pub category: Vec<FieldRule>,

    /// Explicit location markup, tried before keyword inference
    pub location: Vec<FieldRule>,

    /// Date text printed on listing cards
    pub published: Vec<FieldRule>,

    /// Category label -> keywords, matched in table order
    pub categories: IndexMap<String, Vec<String>>,

    /// Location label -> keywords, matched in table order
    pub locations: IndexMap<String, Vec<String>>,

    pub default_category: String,
    pub default_location: String,
    pub default_description: String,

    /// Upper bound for title and description text, in characters
    pub max_text_len: usize,

    /// Characters of card text used when no title selector matches
    pub title_fallback_len: usize,

    pub detail: DetailConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            containers: strings(&[
                "div.search-result",
                "div.view-content div.views-row",
                "article.node",
                "li.search-result",
                ".search-results li",
                "div.views-row",
                "div.card",
                "article",
            ]),
            anchor_fallback: true,
            title: texts(&["h1", "h2", "h3", "h4", ".title", "a[rel~='bookmark']", "a"]),
            link: vec![FieldRule::attr("a[href]", "href")],
            image: vec![
                FieldRule::attr("img[src]", "src"),
                FieldRule::attr("img[data-src]", "data-src"),
            ],
            description: texts(&[".summary", ".teaser", ".field-body", ".description", "p"]),
            category: Vec::new(),
            location: Vec::new(),
            published: vec![
                FieldRule::attr("time[datetime]", "datetime"),
                FieldRule::text("time"),
                FieldRule::text(".date"),
            ],
            categories: IndexMap::new(),
            locations: IndexMap::new(),
            default_category: "general".to_string(),
            default_location: String::new(),
            default_description: String::new(),
            max_text_len: 300,
            title_fallback_len: 120,
            detail: DetailConfig::default(),
        }
    }
}

/// Selector chains for whole detail pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailConfig {
    pub title: Vec<FieldRule>,
    pub description: Vec<FieldRule>,
    pub image: Vec<FieldRule>,

    /// Main content region; its text becomes `details`
    pub body: Vec<FieldRule>,

    /// Regions searched for a phone number before the body
    pub phone_scopes: Vec<FieldRule>,

    /// Explicit price markup, tried before the "precio" sentence search
    pub price: Vec<FieldRule>,

    /// Publication-date sources, in priority order
    pub date_sources: Vec<FieldRule>,

    /// Upper bound for the `details` text, in characters
    pub max_details_len: usize,
}

impl Default for DetailConfig {
    fn default() -> Self {
        Self {
            title: vec![
                FieldRule::text("h1"),
                FieldRule::attr("meta[property='og:title']", "content"),
                FieldRule::text("title"),
            ],
            description: vec![
                FieldRule::attr("meta[name='description']", "content"),
                FieldRule::attr("meta[property='og:description']", "content"),
                FieldRule::text(".node__content p"),
                FieldRule::text("article p"),
                FieldRule::text("main p"),
            ],
            image: vec![
                FieldRule::attr("meta[property='og:image']", "content"),
                FieldRule::attr(".field--name-field-image img", "src"),
                FieldRule::attr(".media img", "src"),
                FieldRule::attr("figure img", "src"),
                FieldRule::attr("article img", "src"),
            ],
            body: texts(&[
                ".node__content",
                ".region-content",
                "article",
                "main",
                ".layout-content",
            ]),
            phone_scopes: texts(&[
                ".field--name-field-telefono",
                ".field--name-field-contacto",
                ".contact",
            ]),
            price: texts(&["span.precio", "div.price", ".field-price"]),
            date_sources: vec![
                FieldRule::attr("meta[property='article:published_time']", "content"),
                FieldRule::attr("meta[property='og:published_time']", "content"),
                FieldRule::attr("meta[name='article:published_time']", "content"),
                FieldRule::attr("meta[name='dcterms.date']", "content"),
                FieldRule::attr("meta[name='DC.date.issued']", "content"),
                FieldRule::attr("meta[property='og:updated_time']", "content"),
                FieldRule::attr("time[datetime]", "datetime"),
                FieldRule::text("time"),
                FieldRule::text(".node__content"),
                FieldRule::text("article"),
                FieldRule::text("main"),
                FieldRule::text(".region-content"),
                FieldRule::text(".layout-content"),
                FieldRule::text("body"),
            ],
            max_details_len: 500,
        }
    }
}

/// Selectors and markers for the three next-page strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Anchors with explicit next-page semantics
    pub next_selectors: Vec<String>,

    /// Case-insensitive text/title markers on any anchor ("Siguiente", "»")
    pub next_markers: Vec<String>,

    /// Numbered pager widgets
    pub pager_selectors: Vec<String>,

    /// The current-page item inside a pager
    pub active_selectors: Vec<String>,

    /// Query parameter incremented by the last-resort strategy
    pub page_param: String,

    /// Enable the URL-parameter increment strategy
    pub parameter_increment: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            next_selectors: strings(&[
                "a[rel~='next']",
                "link[rel~='next']",
                "li.pager-next a",
                "li.pager__item--next a",
                ".pagination .next a",
                "a.next",
            ]),
            next_markers: strings(&["siguiente", "next", "›", "»"]),
            pager_selectors: strings(&[".pager", ".pagination", "ul.pager", "nav.pager"]),
            active_selectors: strings(&[".is-active", ".active", "[aria-current]", ".current"]),
            page_param: "page".to_string(),
            parameter_increment: true,
        }
    }
}

/// Fetch-client behaviour: timeout, retry, politeness and rate cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,

    /// Total attempts per URL, including the first
    pub max_attempts: u32,

    /// First retry delay; doubles per attempt
    pub backoff_base_ms: u64,

    pub backoff_max_ms: u64,

    /// Jittered pause between consecutive fetches of one worker
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,

    /// Global request-rate cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub burst: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 600,
            backoff_max_ms: 10_000,
            min_delay_ms: 1200,
            max_delay_ms: 2200,
            requests_per_second: None,
            burst: None,
            user_agent: None,
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Disable the politeness pause (tests, local fixtures).
    pub fn without_delay(mut self) -> Self {
        self.min_delay_ms = 0;
        self.max_delay_ms = 0;
        self
    }
}

/// Path filters for links followed in deep mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkFilter {
    /// Only follow paths containing one of these (empty = all)
    pub include_patterns: Vec<String>,

    /// Never follow paths containing one of these
    pub exclude_patterns: Vec<String>,
}

impl LinkFilter {
    /// Whether a discovered link's path passes both pattern lists.
    pub fn allows(&self, url: &Url) -> bool {
        let path = url.path();
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|p| path.contains(p.as_str()))
        {
            return false;
        }
        !self.exclude_patterns.iter().any(|p| path.contains(p.as_str()))
    }
}

/// Complete configuration for one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub seeds: Vec<Seed>,

    #[serde(default)]
    pub budget: CrawlBudget,

    #[serde(default)]
    pub retention: RetentionPolicy,

    #[serde(default)]
    pub extractor: ExtractorConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,

    #[serde(default)]
    pub fetch: FetchSettings,

    /// Follow same-site links discovered on fetched pages
    #[serde(default)]
    pub deep: bool,

    /// Fetch each new listing record's own page and enrich the record
    #[serde(default)]
    pub enrich_details: bool,

    #[serde(default)]
    pub follow: LinkFilter,

    /// Seed listings crawled in parallel
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default)]
    pub duplicate_keys: DuplicateKeyPolicy,
}

fn default_concurrency() -> usize {
    4
}

impl CrawlConfig {
    /// Configuration with defaults for everything but the seeds.
    pub fn new(seeds: impl IntoIterator<Item = Seed>) -> Self {
        Self {
            seeds: seeds.into_iter().collect(),
            budget: CrawlBudget::default(),
            retention: RetentionPolicy::default(),
            extractor: ExtractorConfig::default(),
            pagination: PaginationConfig::default(),
            fetch: FetchSettings::default(),
            deep: false,
            enrich_details: false,
            follow: LinkFilter::default(),
            concurrency: default_concurrency(),
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }

    /// Shorthand for seeds given as plain URLs.
    pub fn for_urls(urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(urls.into_iter().map(Seed::new))
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn with_budget(mut self, budget: CrawlBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchSettings) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    pub fn with_enrich_details(mut self, enrich: bool) -> Self {
        self.enrich_details = enrich;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Check ranges and compile every selector.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.seeds.is_empty() {
            return Err(ConfigError::NoSeeds);
        }
        for seed in &self.seeds {
            match Url::parse(&seed.url) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ConfigError::InvalidSeed {
                        url: seed.url.clone(),
                    })
                }
            }
        }

        positive("concurrency", self.concurrency as u64)?;
        positive("budget.max_urls", self.budget.max_urls as u64)?;
        positive(
            "budget.max_pages_per_listing",
            self.budget.max_pages_per_listing as u64,
        )?;
        positive("fetch.timeout_secs", self.fetch.timeout_secs)?;
        positive("fetch.max_attempts", self.fetch.max_attempts as u64)?;
        positive("extractor.max_text_len", self.extractor.max_text_len as u64)?;

        if self.fetch.min_delay_ms > self.fetch.max_delay_ms {
            return Err(ConfigError::InvalidValue {
                field: "fetch.min_delay_ms".to_string(),
                reason: format!(
                    "{} exceeds fetch.max_delay_ms ({})",
                    self.fetch.min_delay_ms, self.fetch.max_delay_ms
                ),
            });
        }
        if let Some(rps) = self.fetch.requests_per_second {
            positive("fetch.requests_per_second", rps as u64)?;
        }
        if let Some(burst) = self.fetch.burst {
            positive("fetch.burst", burst as u64)?;
        }

        RecordExtractor::from_config(&self.extractor)?;
        PaginationResolver::from_config(&self.pagination, self.duplicate_keys)?;
        Ok(())
    }
}

fn positive(field: &str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_json() {
        let config = CrawlConfig::from_json_str(r#"{"seeds": ["https://x.com/buscar?q=feria"]}"#)
            .unwrap();
        assert_eq!(config.seeds, vec![Seed::new("https://x.com/buscar?q=feria")]);
        assert_eq!(config.budget, CrawlBudget::default());
        assert_eq!(config.retention.min_year, 2019);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.extractor.max_text_len, 300);
    }

    #[test]
    fn test_seed_and_rule_shorthands() {
        let config = CrawlConfig::from_json_str(
            r#"{
                "seeds": [
                    "https://a.com/s",
                    {"url": "https://b.com/s", "location": "Huila"}
                ],
                "extractor": {
                    "title": ["h3", {"css": "a", "attr": "title"}],
                    "categories": {"hotel": ["hotel", "hostal"], "evento": ["feria"]}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.seeds[1].location.as_deref(), Some("Huila"));
        assert_eq!(
            config.extractor.title,
            vec![FieldRule::text("h3"), FieldRule::attr("a", "title")]
        );
        let labels: Vec<_> = config.extractor.categories.keys().cloned().collect();
        assert_eq!(labels, vec!["hotel", "evento"]);
        // Unspecified extractor fields keep their defaults.
        assert_eq!(config.extractor.link, ExtractorConfig::default().link);
    }

    #[test]
    fn test_rejects_missing_seeds() {
        assert!(matches!(
            CrawlConfig::from_json_str(r#"{"seeds": []}"#),
            Err(ConfigError::NoSeeds)
        ));
    }

    #[test]
    fn test_rejects_bad_seed() {
        assert!(matches!(
            CrawlConfig::from_json_str(r#"{"seeds": ["ftp://x.com/"]}"#),
            Err(ConfigError::InvalidSeed { .. })
        ));
    }

    #[test]
    fn test_rejects_bad_selector() {
        let err = CrawlConfig::from_json_str(
            r#"{"seeds": ["https://x.com"], "extractor": {"title": ["h3[["]}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { .. }), "{err}");
    }

    #[test]
    fn test_rejects_inverted_delay() {
        let mut config = CrawlConfig::for_urls(["https://x.com"]);
        config.fetch.min_delay_ms = 10;
        config.fetch.max_delay_ms = 5;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_rejects_zero_budget() {
        let mut config = CrawlConfig::for_urls(["https://x.com"]);
        config.budget.max_urls = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CrawlConfig::from_json_str("{"),
            Err(ConfigError::JsonParse(_))
        ));
    }

    #[test]
    fn test_link_filter() {
        let filter = LinkFilter {
            include_patterns: vec!["/es/".to_string()],
            exclude_patterns: vec!["/user".to_string()],
        };
        assert!(filter.allows(&Url::parse("https://x.com/es/noticias").unwrap()));
        assert!(!filter.allows(&Url::parse("https://x.com/en/news").unwrap()));
        assert!(!filter.allows(&Url::parse("https://x.com/es/user/login").unwrap()));
        assert!(LinkFilter::default().allows(&Url::parse("https://x.com/any").unwrap()));
    }
}
