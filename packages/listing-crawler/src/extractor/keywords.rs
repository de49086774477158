//! Keyword tables for category and location inference.

use indexmap::IndexMap;

use crate::text::normalize_for_match;

/// Ordered label -> keyword lists.
///
/// Matching is a case- and accent-insensitive substring test; the first
/// label (in table order) with any matching keyword wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<(String, Vec<String>)>,
}

impl KeywordTable {
    pub fn new(table: &IndexMap<String, Vec<String>>) -> Self {
        let entries = table
            .iter()
            .map(|(label, keywords)| {
                let keywords = keywords
                    .iter()
                    .map(|k| normalize_for_match(k.trim()))
                    .filter(|k| !k.is_empty())
                    .collect();
                (label.clone(), keywords)
            })
            .collect();
        Self { entries }
    }

    /// Label of the first entry with a keyword contained in `text`.
    pub fn classify(&self, text: &str) -> Option<&str> {
        let haystack = normalize_for_match(text);
        self.entries
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|(label, _)| label.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> KeywordTable {
        let mut map = IndexMap::new();
        map.insert(
            "restaurante".to_string(),
            vec!["restaurante".to_string(), "Gastronomía".to_string()],
        );
        map.insert("evento".to_string(), vec!["festival".to_string(), "feria".to_string()]);
        map.insert("vacío".to_string(), vec!["  ".to_string()]);
        KeywordTable::new(&map)
    }

    #[test]
    fn test_accent_and_case_insensitive() {
        let table = table();
        assert_eq!(table.classify("Ruta GASTRONOMIA del Huila"), Some("restaurante"));
        assert_eq!(table.classify("Festival Folclórico"), Some("evento"));
    }

    #[test]
    fn test_table_order_breaks_ties() {
        assert_eq!(table().classify("Feria gastronómica"), Some("restaurante"));
    }

    #[test]
    fn test_no_match_and_blank_keywords() {
        let table = table();
        assert_eq!(table.classify("Parque natural"), None);
        assert!(KeywordTable::default().is_empty());
    }
}
