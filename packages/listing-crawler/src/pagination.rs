//! Next-page resolution for listing pages.
//!
//! Three independent strategies, tried in order:
//!
//! 1. **Next link**: an enabled, visible anchor with next-page semantics
//!    (`rel=next`, a configured selector, or a text marker like "Siguiente").
//! 2. **Numbered pager**: the item after the active one in a pager widget.
//! 3. **Parameter increment**: bump the page query parameter, or add it.
//!
//! Candidates that canonicalize to the current page are ignored.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::canonical::{canonicalize_with, CanonicalUrl, DuplicateKeyPolicy};
use crate::dom::{compile_all, compile_selector, element_text};
use crate::error::ConfigResult;
use crate::extractor::resolve_link;
use crate::text::normalize_for_match;
use crate::types::config::PaginationConfig;

/// Longest anchor text still considered a pager control.
const MAX_MARKER_TEXT: usize = 24;

/// Which strategy produced the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationStrategy {
    NextLink,
    NumberedPager,
    ParameterIncrement,
}

/// Resolved next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: Url,
    pub strategy: PaginationStrategy,
}

#[derive(Debug, Clone)]
pub struct PaginationResolver {
    next_selectors: Vec<Selector>,
    next_markers: Vec<String>,
    anchor: Selector,
    pager_selectors: Vec<Selector>,
    active_selectors: Vec<Selector>,
    page_param: String,
    parameter_increment: bool,
    duplicate_keys: DuplicateKeyPolicy,
}

impl PaginationResolver {
    /// `duplicate_keys` must match the policy the crawl uses for its visited
    /// set, so "same page" means the same thing in both places.
    pub fn from_config(
        config: &PaginationConfig,
        duplicate_keys: DuplicateKeyPolicy,
    ) -> ConfigResult<Self> {
        Ok(Self {
            next_selectors: compile_all("pagination.next_selectors", &config.next_selectors)?,
            next_markers: config
                .next_markers
                .iter()
                .map(|m| normalize_for_match(m.trim()))
                .filter(|m| !m.is_empty())
                .collect(),
            anchor: compile_selector("pagination.anchor", "a[href]")?,
            pager_selectors: compile_all("pagination.pager_selectors", &config.pager_selectors)?,
            active_selectors: compile_all("pagination.active_selectors", &config.active_selectors)?,
            page_param: config.page_param.clone(),
            parameter_increment: config.parameter_increment,
            duplicate_keys,
        })
    }

    /// Decide the page after `current`, or `None` when every strategy fails.
    pub fn next_page(&self, current: &Url, document: &Html) -> Option<NextPage> {
        let current_canon = canonicalize_with(current.as_str(), None, self.duplicate_keys);

        let found = self
            .from_next_link(current, &current_canon, document)
            .map(|url| (url, PaginationStrategy::NextLink))
            .or_else(|| {
                self.from_pager(current, &current_canon, document)
                    .map(|url| (url, PaginationStrategy::NumberedPager))
            })
            .or_else(|| {
                self.from_parameter(current)
                    .map(|url| (url, PaginationStrategy::ParameterIncrement))
            });

        match found {
            Some((url, strategy)) => {
                debug!(current = %current, next = %url, ?strategy, "Resolved next page");
                Some(NextPage { url, strategy })
            }
            None => {
                debug!(current = %current, "No next page");
                None
            }
        }
    }

    fn from_next_link(&self, current: &Url, current_canon: &CanonicalUrl, document: &Html) -> Option<Url> {
        let by_selector = self
            .next_selectors
            .iter()
            .flat_map(|selector| document.select(selector))
            .find_map(|el| self.candidate(&el, current, current_canon));
        if by_selector.is_some() {
            return by_selector;
        }

        if self.next_markers.is_empty() {
            return None;
        }
        document
            .select(&self.anchor)
            .filter(|a| self.has_next_marker(a))
            .find_map(|a| self.candidate(&a, current, current_canon))
    }

    fn has_next_marker(&self, anchor: &ElementRef<'_>) -> bool {
        let text = element_text(anchor)
            .map(|t| normalize_for_match(&t))
            .filter(|t| t.chars().count() <= MAX_MARKER_TEXT);
        let labels = ["title", "aria-label"]
            .iter()
            .filter_map(|attr| anchor.value().attr(attr))
            .map(normalize_for_match);

        text.into_iter()
            .chain(labels)
            .any(|label| self.next_markers.iter().any(|m| label.contains(m.as_str())))
    }

    fn from_pager(&self, current: &Url, current_canon: &CanonicalUrl, document: &Html) -> Option<Url> {
        for pager in self.pager_selectors.iter().flat_map(|s| document.select(s)) {
            for active_selector in &self.active_selectors {
                let Some(active) = pager.select(active_selector).next() else {
                    continue;
                };

                // The active marker sits either on the item itself or on a
                // link inside it, so try the active element's siblings first
                // and then its parent's.
                let scopes = std::iter::once(active).chain(
                    active
                        .parent()
                        .and_then(ElementRef::wrap)
                        .filter(|parent| parent.id() != pager.id()),
                );
                for scope in scopes {
                    let next = scope
                        .next_siblings()
                        .filter_map(ElementRef::wrap)
                        .find_map(|sibling| self.first_anchor(&sibling))
                        .and_then(|a| self.candidate(&a, current, current_canon));
                    if next.is_some() {
                        return next;
                    }
                }
            }
        }
        None
    }

    fn first_anchor<'a>(&self, el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
        if el.value().name() == "a" && el.value().attr("href").is_some() {
            return Some(*el);
        }
        el.select(&self.anchor).next()
    }

    fn from_parameter(&self, current: &Url) -> Option<Url> {
        if !self.parameter_increment || current.cannot_be_a_base() {
            return None;
        }

        let mut found = false;
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (key, value) in current.query_pairs() {
            let value = if key == self.page_param && !found {
                found = true;
                increment_page_value(&value)?
            } else {
                value.into_owned()
            };
            pairs.push((key.into_owned(), value));
        }

        let mut next = current.clone();
        next.set_fragment(None);
        {
            let mut query = next.query_pairs_mut();
            query.clear();
            query.extend_pairs(pairs);
            if !found {
                query.append_pair(&self.page_param, "1");
            }
        }
        Some(next)
    }

    /// Resolve an anchor into a next-page URL if it is usable.
    fn candidate(&self, el: &ElementRef<'_>, current: &Url, current_canon: &CanonicalUrl) -> Option<Url> {
        if is_disabled(el) {
            return None;
        }
        let url = resolve_link(el.value().attr("href")?, current)?;
        if &canonicalize_with(url.as_str(), None, self.duplicate_keys) == current_canon {
            return None;
        }
        Some(url)
    }
}

/// Increment a page value. `"3"` becomes `"4"`; for Drupal-style
/// comma-separated values (`"0,0,0"`) the first component is incremented.
/// Anything unparsable restarts at `"1"`; `None` once the counter is at
/// `u64::MAX`.
fn increment_page_value(value: &str) -> Option<String> {
    let mut parts = value.split(',');
    let first = parts.next().unwrap_or_default().trim();
    match first.parse::<u64>() {
        Ok(n) => Some(
            std::iter::once(n.checked_add(1)?.to_string())
                .chain(parts.map(str::to_string))
                .collect::<Vec<_>>()
                .join(","),
        ),
        Err(_) => Some("1".to_string()),
    }
}

/// Disabled or hidden, on the element itself or its parent.
fn is_disabled(el: &ElementRef<'_>) -> bool {
    std::iter::once(*el)
        .chain(el.parent().and_then(ElementRef::wrap))
        .any(|node| {
            let element = node.value();
            let has_flag = element.attr("disabled").is_some() || element.attr("hidden").is_some();
            let aria = element
                .attr("aria-disabled")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false);
            let class = element
                .classes()
                .any(|c| c == "disabled" || c == "is-disabled");
            let style = element
                .attr("style")
                .map(|s| s.replace(' ', "").to_ascii_lowercase().contains("display:none"))
                .unwrap_or(false);
            has_flag || aria || class || style
        })
}
