//! Product detail parser
//!
//! Extracts title, prices, unit price, weight, product code, the free-text
//! detail sections and the breadcrumb classification from a detail page.
//! Missing elements become absent fields; they never fail the page.

#![allow(clippy::uninlined_format_args)]

use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use super::config::ProductDetailSelectors;
use super::context::DetailParseContext;
use super::{
    ContextualParser, ParsingError, ParsingResult, clean_text, compile_selector, compile_selectors, element_text,
    element_text_spaced, select_first,
};
use crate::domain::{Classifications, DetailRecord};

/// Title recorded when the page has none
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Keys owned by the structured fields; detail sections never overwrite them
const RESERVED_KEYS: [&str; 8] = [
    "title",
    "price",
    "was_price",
    "price_per_uom",
    "weight",
    "product_code",
    "classifications",
    "href",
];

/// Parser for product detail pages
pub struct ProductDetailParser {
    title_selectors: Vec<Selector>,
    price_selectors: Vec<Selector>,
    was_price_selectors: Vec<Selector>,
    price_per_uom_selectors: Vec<Selector>,
    weight_selectors: Vec<Selector>,
    product_code_selectors: Vec<Selector>,
    details_section: Selector,
    details_title: Selector,
    details_content: Selector,
    breadcrumb_container: Selector,
    breadcrumb_link: Selector,
    price_pattern: Regex,
    code_pattern: Regex,
}

impl ProductDetailParser {
    /// Parser with the default grocery selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ProductDetailSelectors::default())
    }

    /// Create parser with custom selector configuration
    pub fn with_config(selectors: &ProductDetailSelectors) -> ParsingResult<Self> {
        Ok(Self {
            title_selectors: compile_selectors(&selectors.title)?,
            price_selectors: compile_selectors(&selectors.price)?,
            was_price_selectors: compile_selectors(&selectors.was_price)?,
            price_per_uom_selectors: compile_selectors(&selectors.price_per_uom)?,
            weight_selectors: compile_selectors(&selectors.weight)?,
            product_code_selectors: compile_selectors(&selectors.product_code)?,
            details_section: compile_selector(&selectors.details_section)?,
            details_title: compile_selector(&selectors.details_title)?,
            details_content: compile_selector(&selectors.details_content)?,
            breadcrumb_container: compile_selector(&selectors.breadcrumb_container)?,
            breadcrumb_link: compile_selector(&selectors.breadcrumb_link)?,
            price_pattern: Self::compile_pattern(r"\d+\.\d+")?,
            code_pattern: Self::compile_pattern(r"\d+")?,
        })
    }

    fn compile_pattern(pattern: &str) -> ParsingResult<Regex> {
        Regex::new(pattern).map_err(|e| ParsingError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
    }

    /// Parse a raw HTML body; the `Html` tree never leaves this call
    pub fn parse_document(&self, body: &str, context: &DetailParseContext) -> ParsingResult<DetailRecord> {
        let html = Html::parse_document(body);
        self.parse_with_context(&html, context)
    }

    /// First decimal number in the text (`£1.25` → `1.25`)
    pub fn extract_price(&self, text: &str) -> Option<String> {
        self.price_pattern.find(text).map(|m| m.as_str().to_string())
    }

    fn field_text(html: &Html, selectors: &[Selector]) -> Option<String> {
        select_first(html, selectors).map(|element| element_text(&element))
    }

    fn extract_details(&self, html: &Html) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();

        for section in html.select(&self.details_section) {
            let title = section.select(&self.details_title).next();
            let content = section.select(&self.details_content).next();
            let (Some(title), Some(content)) = (title, content) else {
                continue;
            };

            let key = clean_text(&element_text(&title)).to_lowercase().replace(' ', "_");
            if key.is_empty() || RESERVED_KEYS.contains(&key.as_str()) {
                debug!("Skipping detail section with key '{}'", key);
                continue;
            }
            details.insert(key, clean_text(&element_text(&content)));
        }

        details
    }

    fn extract_classifications(&self, html: &Html) -> Option<Classifications> {
        let container = html.select(&self.breadcrumb_container).next()?;
        let mut classifications = Classifications::default();

        for (level, link) in container
            .select(&self.breadcrumb_link)
            .take(Classifications::LEVELS.len())
            .enumerate()
        {
            let label = clean_text(&element_text_spaced(&link).replace("breadcrumb", ""));
            classifications.set_level(level, label);
        }

        Some(classifications)
    }
}

impl ContextualParser for ProductDetailParser {
    type Output = DetailRecord;
    type Context = DetailParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        debug!("Parsing product detail from: {}", context.url);

        let title = Self::field_text(html, &self.title_selectors)
            .map(|t| clean_text(&t))
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let price = Self::field_text(html, &self.price_selectors).and_then(|t| self.extract_price(&t));
        let was_price = Self::field_text(html, &self.was_price_selectors).and_then(|t| self.extract_price(&t));

        let price_per_uom = Self::field_text(html, &self.price_per_uom_selectors)
            .map(|t| clean_text(t.trim().trim_matches(|c| c == '(' || c == ')')));

        let weight = Self::field_text(html, &self.weight_selectors).map(|t| clean_text(&t));

        let product_code = Self::field_text(html, &self.product_code_selectors)
            .and_then(|t| self.code_pattern.find(&t).map(|m| m.as_str().to_string()));

        Ok(DetailRecord {
            title,
            price,
            was_price,
            price_per_uom,
            weight,
            product_code,
            classifications: self.extract_classifications(html),
            href: context.url.clone(),
            details: self.extract_details(html),
        })
    }
}
