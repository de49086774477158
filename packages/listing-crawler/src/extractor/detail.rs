//! Whole-page extraction for detail pages.

use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use url::Url;

use super::chain::FieldChain;
use crate::dates::DateLocator;
use crate::dom::{compile_rules, CompiledRule};
use crate::error::ConfigResult;
use crate::text::{clean_text, truncate_chars};
use crate::types::config::DetailConfig;
use crate::types::record::DetailFields;

lazy_static! {
    static ref PHONE: Regex = Regex::new(
        r"(?:\+57\s?)?(?:\(?\d{1,3}\)?[\s\-.]?)?\d{3}[\s\-.]?\d{2,}|\+?\d[\d\s\-.]{6,}"
    )
    .unwrap();
    static ref DATE_LIKE: Regex =
        Regex::new(r"\b(?:\d{4}[/-]\d{1,2}[/-]\d{1,2}|\d{1,2}[/-]\d{1,2}[/-]\d{4})\b").unwrap();
    static ref PRICE_SENTENCE: Regex = Regex::new(r"(?i)[^.]*\bprecios?\b[^.]*\.?").unwrap();
}

const MIN_PHONE_DIGITS: usize = 7;

/// Extracts [`DetailFields`] from a full document.
#[derive(Debug, Clone)]
pub struct DetailExtractor {
    title: FieldChain,
    description: FieldChain,
    image: FieldChain,
    body: FieldChain,
    phone_scopes: Vec<CompiledRule>,
    price: FieldChain,
    dates: DateLocator,
    max_text_len: usize,
    max_details_len: usize,
}

impl DetailExtractor {
    pub fn from_config(config: &DetailConfig, max_text_len: usize) -> ConfigResult<Self> {
        let dates = compile_rules("extractor.detail.date_sources", &config.date_sources)?
            .into_iter()
            .map(|rule| (rule.selector, rule.attr))
            .collect();

        Ok(Self {
            title: FieldChain::from_rules("extractor.detail.title", &config.title)?,
            description: FieldChain::from_rules(
                "extractor.detail.description",
                &config.description,
            )?,
            image: FieldChain::from_rules("extractor.detail.image", &config.image)?,
            body: FieldChain::from_rules("extractor.detail.body", &config.body)?,
            phone_scopes: compile_rules("extractor.detail.phone_scopes", &config.phone_scopes)?,
            price: FieldChain::from_rules("extractor.detail.price", &config.price)?,
            dates: DateLocator::new(dates),
            max_text_len,
            max_details_len: config.max_details_len,
        })
    }

    /// Extract every detail field `document` provides.
    ///
    /// `page_url` is the URL the page was served from; relative image
    /// sources resolve against it. Category and location are left to the
    /// caller, which owns the keyword tables.
    pub fn extract(&self, document: &Html, page_url: &Url) -> DetailFields {
        let root = document.root_element();
        let body = self.body.extract(&root);

        let description = self
            .description
            .extract(&root)
            .or_else(|| body.clone())
            .map(|d| truncate_chars(&d, self.max_text_len));

        let image = self
            .image
            .extract(&root)
            .and_then(|src| page_url.join(&src).ok())
            .map(String::from);

        let scopes: Vec<String> = self
            .phone_scopes
            .iter()
            .flat_map(|rule| root.select(&rule.selector).collect::<Vec<_>>())
            .filter_map(|el| crate::dom::element_text(&el))
            .chain(body.clone())
            .collect();

        DetailFields {
            title: self
                .title
                .extract(&root)
                .map(|t| truncate_chars(&t, self.max_text_len)),
            description,
            category: None,
            location: None,
            image,
            published_raw: self.dates.find_text(document).map(|(raw, _)| raw),
            phone: find_phone(&scopes),
            price: self.price.extract(&root).or_else(|| find_price(&scopes)),
            details: body.map(|b| truncate_chars(&b, self.max_details_len)),
        }
    }
}

/// First phone-number-looking run of digits, ignoring numeric dates.
fn find_phone(scopes: &[String]) -> Option<String> {
    scopes.iter().find_map(|scope| {
        let scrubbed = DATE_LIKE.replace_all(scope, " ");
        PHONE
            .find_iter(&scrubbed)
            .map(|m| m.as_str())
            .find(|candidate| {
                candidate.chars().filter(char::is_ascii_digit).count() >= MIN_PHONE_DIGITS
            })
            .and_then(clean_text)
    })
}

/// First sentence mentioning a price.
fn find_price(scopes: &[String]) -> Option<String> {
    scopes
        .iter()
        .find_map(|scope| PRICE_SENTENCE.find(scope))
        .and_then(|m| clean_text(m.as_str()))
}
