//! Publication-date normalization.
//!
//! Pages publish dates as ISO timestamps in metadata, as Spanish long-form
//! text ("12 de julio de 2021"), or as numeric day-first or year-first
//! strings. [`parse_date`] tries each format in a fixed order and returns
//! the first calendar-valid match.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::{Captures, Match, Regex};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::text::{clean_text, fold_accents};

lazy_static! {
    static ref ISO_LIKE: Regex = Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$"
    )
    .unwrap();
    static ref SPANISH_LONG: Regex =
        Regex::new(r"(?i)\b(\d{1,2})\s+de\s+(\p{L}+)\s+(?:de|del)\s+(\d{4})\b").unwrap();
    static ref DAY_FIRST: Regex = Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b").unwrap();
    static ref YEAR_FIRST: Regex = Regex::new(r"\b(\d{4})[/-](\d{1,2})[/-](\d{1,2})\b").unwrap();
}

const SPANISH_MONTHS: [(&str, u32); 13] = [
    ("enero", 1),
    ("febrero", 2),
    ("marzo", 3),
    ("abril", 4),
    ("mayo", 5),
    ("junio", 6),
    ("julio", 7),
    ("agosto", 8),
    ("septiembre", 9),
    ("setiembre", 9),
    ("octubre", 10),
    ("noviembre", 11),
    ("diciembre", 12),
];

/// How much the parsed value can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateConfidence {
    /// Parsed from a structured ISO-8601 value
    Exact,
    /// Recovered from free text, or nothing found
    Inferred,
}

/// Outcome of date normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateParseResult {
    pub value: Option<NaiveDate>,
    pub confidence: DateConfidence,
}

impl DateParseResult {
    /// No recognizable date.
    pub fn unknown() -> Self {
        Self {
            value: None,
            confidence: DateConfidence::Inferred,
        }
    }

    fn exact(date: NaiveDate) -> Self {
        Self {
            value: Some(date),
            confidence: DateConfidence::Exact,
        }
    }

    fn inferred(date: NaiveDate) -> Self {
        Self {
            value: Some(date),
            confidence: DateConfidence::Inferred,
        }
    }

    /// Year of the parsed date, if any.
    pub fn year(&self) -> Option<i32> {
        self.value.map(|d| d.year())
    }

    pub fn is_known(&self) -> bool {
        self.value.is_some()
    }
}

/// Parse free-form publication-date text.
///
/// Formats are tried in order: ISO-8601 (the whole string), Spanish
/// long-form, `DD/MM/YYYY`, then `YYYY/MM/DD` anywhere in the text. A match
/// that names an impossible date (month 13, February 31st) does not stop
/// the search.
pub fn parse_date(text: &str) -> DateParseResult {
    find_date(text)
        .map(|(result, _)| result)
        .unwrap_or_else(DateParseResult::unknown)
}

/// Like [`parse_date`], but also returns the substring that matched.
pub fn find_date(text: &str) -> Option<(DateParseResult, &str)> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_LIKE.captures(text) {
        if let Some(date) = ymd(&caps, 1, 2, 3) {
            return Some((DateParseResult::exact(date), text));
        }
    }

    let parsers: [fn(&str) -> Option<(NaiveDate, Match<'_>)>; 3] =
        [parse_spanish_long, parse_day_first, parse_year_first];
    parsers
        .iter()
        .find_map(|parse| parse(text))
        .map(|(date, m)| (DateParseResult::inferred(date), m.as_str()))
}

fn parse_spanish_long(text: &str) -> Option<(NaiveDate, Match<'_>)> {
    SPANISH_LONG.captures_iter(text).find_map(|caps| {
        let month_name = fold_accents(&caps[2]).to_lowercase();
        let month = SPANISH_MONTHS
            .iter()
            .find(|(name, _)| *name == month_name)
            .map(|(_, number)| *number)?;
        let day = caps[1].parse().ok()?;
        let year = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        Some((date, caps.get(0)?))
    })
}

fn parse_day_first(text: &str) -> Option<(NaiveDate, Match<'_>)> {
    DAY_FIRST
        .captures_iter(text)
        .find_map(|caps| Some((ymd(&caps, 3, 2, 1)?, caps.get(0)?)))
}

fn parse_year_first(text: &str) -> Option<(NaiveDate, Match<'_>)> {
    YEAR_FIRST
        .captures_iter(text)
        .find_map(|caps| Some((ymd(&caps, 1, 2, 3)?, caps.get(0)?)))
}

fn ymd(caps: &Captures<'_>, year: usize, month: usize, day: usize) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(
        caps[year].parse().ok()?,
        caps[month].parse().ok()?,
        caps[day].parse().ok()?,
    )
}

/// Where to look for a publication date on a detail page.
///
/// Sources are tried in order; for each source the first element with a
/// non-empty value is handed to [`parse_date`], and the first calendar-valid
/// result wins.
#[derive(Debug, Clone)]
pub struct DateLocator {
    sources: Vec<DateSource>,
}

#[derive(Debug, Clone)]
struct DateSource {
    selector: Selector,
    attr: Option<String>,
}

impl DateLocator {
    /// Build a locator from `(css, attribute)` pairs. `None` reads element text.
    pub fn new(sources: Vec<(Selector, Option<String>)>) -> Self {
        Self {
            sources: sources
                .into_iter()
                .map(|(selector, attr)| DateSource { selector, attr })
                .collect(),
        }
    }

    /// Find and parse the publication date of a whole document.
    pub fn find(&self, document: &Html) -> DateParseResult {
        self.find_text(document)
            .map(|(_, result)| result)
            .unwrap_or_else(DateParseResult::unknown)
    }

    /// Like [`find`](Self::find) but also returns the date text as printed.
    pub fn find_text(&self, document: &Html) -> Option<(String, DateParseResult)> {
        for source in &self.sources {
            for element in document.select(&source.selector) {
                let raw = match &source.attr {
                    Some(attr) => element.value().attr(attr).map(str::to_string),
                    None => clean_text(&element.text().collect::<Vec<_>>().join(" ")),
                };
                let Some(raw) = raw else {
                    continue;
                };

                if let Some((result, matched)) = find_date(&raw) {
                    debug!(matched = %matched, date = ?result.value, "Publication date located");
                    return Some((matched.to_string(), result));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn test_spanish_long_form() {
        let result = parse_date("12 de julio de 2021");
        assert_eq!(result.value, date(2021, 7, 12));
        assert_eq!(result.confidence, DateConfidence::Inferred);
    }

    #[test]
    fn test_spanish_accents_and_case() {
        assert_eq!(parse_date("Publicado el 3 de FEBRERO de 2020").value, date(2020, 2, 3));
        assert_eq!(parse_date("1 de Setiembre de 2019").value, date(2019, 9, 1));
        assert_eq!(parse_date("5 de marzó de 2022").value, date(2022, 3, 5));
    }

    #[test]
    fn test_iso_timestamp() {
        let result = parse_date("2021-07-12T00:00:00Z");
        assert_eq!(result.value, date(2021, 7, 12));
        assert_eq!(result.confidence, DateConfidence::Exact);

        assert_eq!(parse_date("2023-01-05").value, date(2023, 1, 5));
        assert_eq!(parse_date("2023-01-05T10:30:00-05:00").value, date(2023, 1, 5));
        assert_eq!(parse_date("2023-01-05T10:30:00.123+0000").value, date(2023, 1, 5));
    }

    #[test]
    fn test_invalid_calendar_date_falls_through() {
        assert_eq!(parse_date("31/02/2021").value, None);
        assert_eq!(parse_date("2021-13-01").value, None);
    }

    #[test]
    fn test_invalid_iso_falls_through_to_free_text() {
        // Not ISO as a whole string, but contains a valid year-first date.
        let result = parse_date("Actualizado 2021/07/12 por la oficina");
        assert_eq!(result.value, date(2021, 7, 12));
        assert_eq!(result.confidence, DateConfidence::Inferred);
    }

    #[test]
    fn test_day_first_numeric() {
        assert_eq!(parse_date("Fecha: 12/07/2021").value, date(2021, 7, 12));
        assert_eq!(parse_date("12-07-2021").value, date(2021, 7, 12));
    }

    #[test]
    fn test_spanish_text_beats_numeric() {
        let result = parse_date("3 de enero de 2020 (rev. 04/05/2021)");
        assert_eq!(result.value, date(2020, 1, 3));
    }

    #[test]
    fn test_unknown_month_name_falls_through() {
        assert_eq!(parse_date("12 de brumario de 2021").value, None);
        assert_eq!(
            parse_date("12 de brumario de 2021, 05/06/2021").value,
            date(2021, 6, 5)
        );
    }

    #[test]
    fn test_later_valid_match_in_same_pattern() {
        assert_eq!(parse_date("31/02/2021 o 01/03/2021").value, date(2021, 3, 1));
    }

    #[test]
    fn test_find_date_returns_matched_text() {
        let (result, matched) = find_date("Publicado el 7 de mayo de 2020 en Neiva").unwrap();
        assert_eq!(matched, "7 de mayo de 2020");
        assert_eq!(result.value, date(2020, 5, 7));
        assert!(find_date("sin fecha").is_none());
    }

    #[test]
    fn test_no_date() {
        let result = parse_date("Sin fecha disponible");
        assert_eq!(result, DateParseResult::unknown());
        assert_eq!(parse_date("").value, None);
        assert_eq!(parse_date("   ").year(), None);
    }

    #[test]
    fn test_locator_prefers_metadata() {
        let html = Html::parse_document(
            r#"<html><head>
                <meta property="article:published_time" content="2022-03-04T08:00:00Z">
            </head><body>
                <time>1 de enero de 2015</time>
            </body></html>"#,
        );
        let locator = DateLocator::new(vec![
            (
                Selector::parse("meta[property='article:published_time']").unwrap(),
                Some("content".to_string()),
            ),
            (Selector::parse("time").unwrap(), None),
        ]);

        let (raw, result) = locator.find_text(&html).unwrap();
        assert_eq!(raw, "2022-03-04T08:00:00Z");
        assert_eq!(result.value, date(2022, 3, 4));
        assert_eq!(result.confidence, DateConfidence::Exact);
    }

    #[test]
    fn test_locator_skips_unparseable_sources() {
        let html = Html::parse_document(
            r#"<html><body><time datetime="">hoy</time><main>Publicado el 7 de mayo de 2020</main></body></html>"#,
        );
        let locator = DateLocator::new(vec![
            (Selector::parse("time[datetime]").unwrap(), Some("datetime".to_string())),
            (Selector::parse("time").unwrap(), None),
            (Selector::parse("main").unwrap(), None),
        ]);

        let (raw, result) = locator.find_text(&html).unwrap();
        assert_eq!(raw, "7 de mayo de 2020");
        assert_eq!(result.value, date(2020, 5, 7));
    }
}
