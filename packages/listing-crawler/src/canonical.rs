//! URL canonicalization.
//!
//! Every URL the crawler sees is reduced to a [`CanonicalUrl`] before it is
//! compared against the visited set or the result set, so that links that
//! differ only in fragment, parameter order, or trailing slash are treated as
//! the same page.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::{form_urlencoded, Url};

/// Normalized identity of a URL.
///
/// Scheme and host are lowercased, the fragment is dropped, trailing slashes
/// are trimmed from the path (the root path `/` is kept), and query
/// parameters are sorted by key and re-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    /// Canonicalize an absolute URL.
    pub fn parse(raw: &str) -> Self {
        canonicalize(raw, None)
    }

    /// The canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the canonical form back into a [`Url`].
    ///
    /// Returns `None` for inputs that were kept verbatim because they never
    /// parsed in the first place.
    pub fn to_url(&self) -> Option<Url> {
        Url::parse(&self.0).ok()
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How repeated query keys (`?a=1&a=2`) collapse into the canonical form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Keep only the first value seen for each key.
    #[default]
    FirstWins,
    /// Keep every value, in original order, grouped under the sorted key.
    KeepAll,
}

/// Canonicalize `raw`, resolving it against `base` when it is relative.
///
/// Never fails: input that cannot be parsed is returned unchanged.
pub fn canonicalize(raw: &str, base: Option<&Url>) -> CanonicalUrl {
    canonicalize_with(raw, base, DuplicateKeyPolicy::default())
}

/// Canonicalize with an explicit policy for repeated query keys.
pub fn canonicalize_with(
    raw: &str,
    base: Option<&Url>,
    policy: DuplicateKeyPolicy,
) -> CanonicalUrl {
    let trimmed = raw.trim();
    let parsed = match base {
        Some(base) => base.join(trimmed),
        None => Url::parse(trimmed),
    };

    let mut url = match parsed {
        Ok(url) => url,
        Err(_) => return CanonicalUrl(raw.to_string()),
    };

    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(if path.is_empty() { "/" } else { &path });
    }

    let pairs = sorted_query_pairs(&url, policy);
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let query = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs)
            .finish();
        url.set_query(Some(&query));
    }

    CanonicalUrl(url.into())
}

fn sorted_query_pairs(url: &Url, policy: DuplicateKeyPolicy) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = match policy {
        DuplicateKeyPolicy::FirstWins => {
            let mut seen = HashSet::new();
            url.query_pairs()
                .filter(|(k, _)| seen.insert(k.to_string()))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        }
        DuplicateKeyPolicy::KeepAll => url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect(),
    };

    // Stable sort keeps KeepAll values in their original order.
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}
