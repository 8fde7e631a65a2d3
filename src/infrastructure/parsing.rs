//! HTML parsing for grocery listing and product detail pages
//!
//! Parsers compile their CSS selectors once and work on an already parsed
//! `scraper::Html`. `Html` is not `Send`, so callers fetch the body first and
//! parse inside a synchronous scope.

pub mod config;
pub mod context;
pub mod error;
pub mod product_detail_parser;
pub mod product_list_parser;

pub use config::{ParsingConfig, ProductDetailSelectors, ProductListSelectors};
pub use context::{DetailParseContext, ParseContext};
pub use error::{ParsingError, ParsingResult};
pub use product_detail_parser::ProductDetailParser;
pub use product_list_parser::{ProductListParser, TaxonomyLink};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}

/// Compile fallback selector strings; fails only when none of them compile
pub(crate) fn compile_selectors(selector_strings: &[String]) -> ParsingResult<Vec<Selector>> {
    let mut selectors = Vec::new();
    let mut errors = Vec::new();

    for selector_str in selector_strings {
        match Selector::parse(selector_str) {
            Ok(selector) => selectors.push(selector),
            Err(e) => {
                warn!("Failed to compile selector '{}': {}", selector_str, e);
                errors.push(format!("'{}': {}", selector_str, e));
            }
        }
    }

    if selectors.is_empty() {
        return Err(ParsingError::InvalidSelector {
            selector: selector_strings.join(", "),
            reason: if errors.is_empty() {
                "no selectors configured".to_string()
            } else {
                errors.join(", ")
            },
        });
    }

    if !errors.is_empty() {
        debug!("Some selectors failed to compile: {}", errors.join(", "));
    }

    Ok(selectors)
}

/// Compile a single structural selector
pub(crate) fn compile_selector(selector: &str) -> ParsingResult<Selector> {
    Selector::parse(selector).map_err(|e| ParsingError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// First element matched by any of the fallback selectors, in selector order
pub(crate) fn select_first<'a>(html: &'a Html, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|selector| html.select(selector).next())
}

/// Same as [`select_first`] but scoped to an element
pub(crate) fn select_first_in<'a>(element: &ElementRef<'a>, selectors: &[Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|selector| element.select(selector).next())
}

/// Concatenated text of an element
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Text nodes trimmed and joined with single spaces
pub(crate) fn element_text_spaced(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize non-breaking spaces and curly quotes, then trim
pub fn clean_text(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .trim()
        .to_string()
}
