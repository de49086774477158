//! Record extraction from listing cards and detail pages.
//!
//! Every field is read through a [`FieldChain`]: an ordered list of
//! strategies where the first non-empty value wins. Extraction is pure; the
//! extractor never fetches anything and never fails. A fragment without a
//! usable link simply yields no record.

mod chain;
mod detail;
mod keywords;

pub use chain::FieldChain;
pub use detail::DetailExtractor;
pub use keywords::KeywordTable;

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

use crate::canonical::{canonicalize_with, CanonicalUrl, DuplicateKeyPolicy};
use crate::dom::{compile_all, compile_selector, element_text};
use crate::error::ConfigResult;
use crate::text::truncate_chars;
use crate::types::config::ExtractorConfig;
use crate::types::record::{DetailFields, ExtractedRecord, RecordKind};

const CARD_ANCESTORS: [&str; 4] = ["article", "li", "div", "section"];

/// Per-page inputs that are not part of the static configuration.
#[derive(Debug, Clone)]
pub struct ExtractionContext {
    /// URL the page was served from; relative links resolve against it
    pub base_url: Url,

    /// Location label used when neither markup nor keywords give one
    pub default_location: Option<String>,

    pub extracted_at: DateTime<Utc>,

    pub duplicate_keys: DuplicateKeyPolicy,
}

impl ExtractionContext {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            default_location: None,
            extracted_at: Utc::now(),
            duplicate_keys: DuplicateKeyPolicy::default(),
        }
    }

    pub fn with_default_location(mut self, location: Option<String>) -> Self {
        self.default_location = location;
        self
    }

    pub fn with_extracted_at(mut self, at: DateTime<Utc>) -> Self {
        self.extracted_at = at;
        self
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }
}

/// Whether an `href` can point at a record page at all.
pub fn is_followable(href: &str) -> bool {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return false;
    }
    let lower = href.to_ascii_lowercase();
    !["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Resolve `href` against `base`, keeping only http(s) results.
pub fn resolve_link(href: &str, base: &Url) -> Option<Url> {
    if !is_followable(href) {
        return None;
    }
    base.join(href.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Compiled extraction configuration.
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    containers: Vec<Selector>,
    anchor_fallback: bool,
    anchor: Selector,
    title: FieldChain,
    link: FieldChain,
    image: FieldChain,
    description: FieldChain,
    category: FieldChain,
    location: FieldChain,
    published: FieldChain,
    categories: KeywordTable,
    locations: KeywordTable,
    default_category: String,
    default_location: String,
    default_description: String,
    max_text_len: usize,
    detail: DetailExtractor,
}

impl RecordExtractor {
    pub fn from_config(config: &ExtractorConfig) -> ConfigResult<Self> {
        let fallback_len = config.title_fallback_len;
        let title = FieldChain::from_rules("extractor.title", &config.title)?.push_fn(
            move |fragment| element_text(fragment).map(|text| truncate_chars(&text, fallback_len)),
        );

        Ok(Self {
            containers: compile_all("extractor.containers", &config.containers)?,
            anchor_fallback: config.anchor_fallback,
            anchor: compile_selector("extractor.anchor", "a[href]")?,
            title,
            link: FieldChain::from_rules_filtered("extractor.link", &config.link, is_followable)?,
            image: FieldChain::from_rules("extractor.image", &config.image)?,
            description: FieldChain::from_rules("extractor.description", &config.description)?,
            category: FieldChain::from_rules("extractor.category", &config.category)?,
            location: FieldChain::from_rules("extractor.location", &config.location)?,
            published: FieldChain::from_rules("extractor.published", &config.published)?,
            categories: KeywordTable::new(&config.categories),
            locations: KeywordTable::new(&config.locations),
            default_category: config.default_category.clone(),
            default_location: config.default_location.clone(),
            default_description: config.default_description.clone(),
            max_text_len: config.max_text_len,
            detail: DetailExtractor::from_config(&config.detail, config.max_text_len)?,
        })
    }

    /// Candidate card fragments of a listing page, in document order.
    ///
    /// The first container selector that matches anything wins. With no
    /// match, each link's nearest card-like ancestor is used instead.
    pub fn candidates<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in &self.containers {
            let found: Vec<_> = document.select(selector).collect();
            if !found.is_empty() {
                return found;
            }
        }

        if !self.anchor_fallback {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        document
            .select(&self.anchor)
            .filter_map(|anchor| {
                anchor
                    .ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|el| CARD_ANCESTORS.contains(&el.value().name()))
            })
            .filter(|card| seen.insert(card.id()))
            .collect()
    }

    /// Turn one card fragment into a record, or `None` when it has no
    /// resolvable link.
    pub fn extract(&self, fragment: &ElementRef<'_>, ctx: &ExtractionContext) -> Option<ExtractedRecord> {
        let href = self.link.extract(fragment)?;
        let url = resolve_link(&href, &ctx.base_url)?;
        let link = canonicalize_with(url.as_str(), None, ctx.duplicate_keys);

        let title = self
            .title
            .extract(fragment)
            .map(|t| truncate_chars(&t, self.max_text_len))
            .unwrap_or_default();

        let description = self
            .description
            .extract(fragment)
            .map(|d| truncate_chars(&d, self.max_text_len))
            .unwrap_or_else(|| self.default_description.clone());

        let fragment_text = element_text(fragment).unwrap_or_default();
        let category = self
            .category
            .extract(fragment)
            .or_else(|| self.infer_category(&format!("{fragment_text} {title}")))
            .unwrap_or_else(|| self.default_category.clone());

        let location = self
            .location
            .extract(fragment)
            .or_else(|| self.infer_location(&format!("{title} {description}")))
            .or_else(|| ctx.default_location.clone())
            .unwrap_or_else(|| self.default_location.clone());

        let mut record = ExtractedRecord::new(title, link, ctx.extracted_at)
            .with_category(category)
            .with_description(description)
            .with_location(location);

        if let Some(image) = self
            .image
            .extract(fragment)
            .and_then(|src| ctx.base_url.join(&src).ok())
        {
            record = record.with_image(image);
        }
        if let Some(raw) = self.published.extract(fragment) {
            record = record.with_published_raw(raw);
        }

        Some(record)
    }

    /// Extract every card on a listing page.
    ///
    /// Cards pointing at a link already seen on this page are dropped so
    /// one page never contributes the same record twice.
    pub fn extract_all(&self, document: &Html, ctx: &ExtractionContext) -> Vec<ExtractedRecord> {
        let mut seen: HashSet<CanonicalUrl> = HashSet::new();
        let records: Vec<_> = self
            .candidates(document)
            .iter()
            .filter_map(|fragment| self.extract(fragment, ctx))
            .filter(|record| seen.insert(record.link.clone()))
            .collect();

        debug!(url = %ctx.base_url, records = records.len(), "Extracted listing records");
        records
    }

    /// Detail fields of a whole page, including inferred category and
    /// location.
    pub fn extract_detail(&self, document: &Html, ctx: &ExtractionContext) -> DetailFields {
        let mut fields = self.detail.extract(document, &ctx.base_url);
        let root = document.root_element();

        let title = fields.title.clone().unwrap_or_default();
        let description = fields.description.clone().unwrap_or_default();

        fields.category = self
            .category
            .extract(&root)
            .or_else(|| self.infer_category(&format!("{title} {description}")));
        fields.location = self
            .location
            .extract(&root)
            .or_else(|| self.infer_location(&format!("{title} {description}")));
        fields
    }

    /// A standalone record for a page reached in deep mode.
    pub fn detail_record(&self, document: &Html, ctx: &ExtractionContext) -> ExtractedRecord {
        let fields = self.extract_detail(document, ctx);
        let link = canonicalize_with(ctx.base_url.as_str(), None, ctx.duplicate_keys);

        let mut record = ExtractedRecord::new(ctx.base_url.as_str(), link, ctx.extracted_at)
            .with_category(self.default_category.clone())
            .with_description(self.default_description.clone())
            .with_location(
                ctx.default_location
                    .clone()
                    .unwrap_or_else(|| self.default_location.clone()),
            );
        record.enrich(fields);
        record.kind = RecordKind::DetailPage;
        record
    }

    fn infer_category(&self, text: &str) -> Option<String> {
        self.categories.classify(text).map(str::to_string)
    }

    fn infer_location(&self, text: &str) -> Option<String> {
        self.locations.classify(text).map(str::to_string)
    }
}
