//! Thin helpers over `scraper` for selector compilation and text reads.

use scraper::{ElementRef, Selector};

use crate::error::{ConfigError, ConfigResult};
use crate::text::clean_text;
use crate::types::config::FieldRule;

/// Parse a CSS selector, naming the config field on failure.
pub fn compile_selector(field: &str, css: &str) -> ConfigResult<Selector> {
    Selector::parse(css).map_err(|e| ConfigError::InvalidSelector {
        field: field.to_string(),
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Compile a list of selectors, preserving order.
pub fn compile_all(field: &str, selectors: &[String]) -> ConfigResult<Vec<Selector>> {
    selectors
        .iter()
        .map(|css| compile_selector(field, css))
        .collect()
}

/// A compiled [`FieldRule`].
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub selector: Selector,
    pub attr: Option<String>,
}

impl CompiledRule {
    pub fn compile(field: &str, rule: &FieldRule) -> ConfigResult<Self> {
        Ok(Self {
            selector: compile_selector(field, &rule.css)?,
            attr: rule.attr.clone(),
        })
    }

    /// First non-empty value among elements under `scope` matching the rule.
    pub fn read(&self, scope: &ElementRef<'_>) -> Option<String> {
        scope
            .select(&self.selector)
            .find_map(|el| read_value(&el, self.attr.as_deref()))
    }

    /// First value under `scope` that `accept` allows.
    pub fn read_where(&self, scope: &ElementRef<'_>, accept: fn(&str) -> bool) -> Option<String> {
        scope
            .select(&self.selector)
            .filter_map(|el| read_value(&el, self.attr.as_deref()))
            .find(|value| accept(value))
    }
}

/// Compile every rule of one field.
pub fn compile_rules(field: &str, rules: &[FieldRule]) -> ConfigResult<Vec<CompiledRule>> {
    rules
        .iter()
        .map(|rule| CompiledRule::compile(field, rule))
        .collect()
}

/// Attribute value (trimmed) or whitespace-collapsed text of an element.
pub fn read_value(el: &ElementRef<'_>, attr: Option<&str>) -> Option<String> {
    match attr {
        Some(attr) => el
            .value()
            .attr(attr)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        None => element_text(el),
    }
}

/// Whitespace-collapsed text content of an element.
pub fn element_text(el: &ElementRef<'_>) -> Option<String> {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn test_compile_error_names_field() {
        let err = compile_selector("extractor.title", "h3[[").unwrap_err();
        match err {
            ConfigError::InvalidSelector { field, selector, .. } => {
                assert_eq!(field, "extractor.title");
                assert_eq!(selector, "h3[[");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_reads_first_non_empty() {
        let html = Html::parse_fragment(
            r#"<div><img src=""><img src=" /b.jpg "><p>  uno
            dos </p></div>"#,
        );
        let root = html.root_element();

        let img = CompiledRule::compile("image", &FieldRule::attr("img", "src")).unwrap();
        assert_eq!(img.read(&root).as_deref(), Some("/b.jpg"));

        let text = CompiledRule::compile("description", &FieldRule::text("p")).unwrap();
        assert_eq!(text.read(&root).as_deref(), Some("uno dos"));
    }
}
