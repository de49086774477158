//! Extracted records and the detail-page fields used to enrich them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalUrl;

/// Where a record was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordKind {
    /// A card on a search-result listing page
    ListingResult,
    /// A full detail page (enriched listing record or deep-crawl page)
    DetailPage,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::ListingResult => "listing-result",
            RecordKind::DetailPage => "detail-page",
        }
    }
}

/// One structured record pulled from a listing card or a detail page.
///
/// `link` is the record's identity: the result set never holds two records
/// with the same link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub title: String,

    pub category: String,

    pub description: String,

    /// Canonical link to the record's own page
    pub link: CanonicalUrl,

    /// Absolute image URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    pub location: String,

    pub kind: RecordKind,

    /// Publication-date text exactly as found on the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_raw: Option<String>,

    /// Normalized publication date, set once the date has been parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<NaiveDate>,

    pub extracted_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ExtractedRecord {
    /// Create a listing record with the required fields.
    pub fn new(title: impl Into<String>, link: CanonicalUrl, extracted_at: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            category: String::new(),
            description: String::new(),
            link,
            image: None,
            location: String::new(),
            kind: RecordKind::ListingResult,
            published_raw: None,
            published: None,
            extracted_at,
            phone: None,
            price: None,
            details: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_published_raw(mut self, raw: impl Into<String>) -> Self {
        self.published_raw = Some(raw.into());
        self
    }

    pub fn with_kind(mut self, kind: RecordKind) -> Self {
        self.kind = kind;
        self
    }

    /// Overwrite fields with values found on the record's detail page.
    ///
    /// Only fields the detail page actually produced are replaced; nothing is
    /// appended. The record becomes a [`RecordKind::DetailPage`].
    pub fn enrich(&mut self, detail: DetailFields) {
        fn overwrite(slot: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn overwrite_opt(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }

        overwrite(&mut self.title, detail.title);
        overwrite(&mut self.description, detail.description);
        overwrite(&mut self.category, detail.category);
        overwrite(&mut self.location, detail.location);
        overwrite_opt(&mut self.image, detail.image);
        overwrite_opt(&mut self.published_raw, detail.published_raw);
        overwrite_opt(&mut self.phone, detail.phone);
        overwrite_opt(&mut self.price, detail.price);
        overwrite_opt(&mut self.details, detail.details);
        self.kind = RecordKind::DetailPage;
    }
}

/// Fields found on a detail page.
///
/// Every field is optional: `None` means the page did not provide it, and
/// enrichment leaves the listing value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub published_raw: Option<String>,
    pub phone: Option<String>,
    pub price: Option<String>,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing() -> ExtractedRecord {
        ExtractedRecord::new(
            "Feria de las flores",
            CanonicalUrl::parse("https://x.com/feria"),
            Utc::now(),
        )
        .with_category("evento")
        .with_description("Resumen corto")
        .with_location("Huila")
        .with_image("https://x.com/a.jpg")
    }

    #[test]
    fn test_enrich_overwrites_only_present_fields() {
        let mut record = listing();
        record.enrich(DetailFields {
            description: Some("Descripción completa".to_string()),
            phone: Some("+57 300 123 4567".to_string()),
            ..Default::default()
        });

        assert_eq!(record.title, "Feria de las flores");
        assert_eq!(record.description, "Descripción completa");
        assert_eq!(record.category, "evento");
        assert_eq!(record.image.as_deref(), Some("https://x.com/a.jpg"));
        assert_eq!(record.phone.as_deref(), Some("+57 300 123 4567"));
        assert_eq!(record.kind, RecordKind::DetailPage);
    }

    #[test]
    fn test_enrich_does_not_append() {
        let mut record = listing();
        record.enrich(DetailFields {
            title: Some("Feria".to_string()),
            ..Default::default()
        });
        record.enrich(DetailFields {
            title: Some("Feria".to_string()),
            ..Default::default()
        });
        assert_eq!(record.title, "Feria");
    }

    #[test]
    fn test_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&RecordKind::ListingResult).unwrap();
        assert_eq!(json, "\"listing-result\"");
        assert_eq!(RecordKind::DetailPage.as_str(), "detail-page");
    }
}
