//! Listing page parser
//!
//! Aisle pages list product tiles; category and department pages list
//! taxonomy buttons. Both are used by discovery to build the crawl item list.

#![allow(clippy::uninlined_format_args)]

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::config::ProductListSelectors;
use super::context::ParseContext;
use super::{
    ContextualParser, ParsingError, ParsingResult, clean_text, compile_selectors, element_text, select_first,
    select_first_in,
};
use crate::domain::CrawlItem;

/// One navigation button (category, department or aisle)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyLink {
    pub href: String,
    pub label: String,
}

/// Parser for listing pages
pub struct ProductListParser {
    product_container_selectors: Vec<Selector>,
    title_selectors: Vec<Selector>,
    link_selectors: Vec<Selector>,
    taxonomy_selectors: Vec<Selector>,
    last_page_selectors: Vec<Selector>,
}

impl ProductListParser {
    /// Parser with the default grocery selectors
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&ProductListSelectors::default())
    }

    /// Create parser with custom selector configuration
    pub fn with_config(selectors: &ProductListSelectors) -> ParsingResult<Self> {
        Ok(Self {
            product_container_selectors: compile_selectors(&selectors.product_container)?,
            title_selectors: compile_selectors(&selectors.title)?,
            link_selectors: compile_selectors(&selectors.product_link)?,
            taxonomy_selectors: compile_selectors(&selectors.taxonomy_link)?,
            last_page_selectors: compile_selectors(&selectors.last_page)?,
        })
    }

    /// Parse product tiles from a raw HTML body
    pub fn parse_items(&self, body: &str, context: &ParseContext) -> ParsingResult<Vec<CrawlItem>> {
        let html = Html::parse_document(body);
        self.parse_with_context(&html, context)
    }

    /// Navigation buttons of a category / department page, hrefs resolved
    pub fn parse_taxonomy_links(&self, body: &str, base_url: &str) -> ParsingResult<Vec<TaxonomyLink>> {
        let html = Html::parse_document(body);
        let base = parse_base(base_url)?;
        let mut links = Vec::new();

        for selector in &self.taxonomy_selectors {
            for element in html.select(selector) {
                let Some(href) = element.value().attr("href") else {
                    continue;
                };
                let label = clean_text(&element_text(&element));
                match base.join(href) {
                    Ok(url) => links.push(TaxonomyLink {
                        href: url.to_string(),
                        label,
                    }),
                    Err(e) => warn!("Skipping taxonomy link '{}': {}", href, e),
                }
            }
            if !links.is_empty() {
                break;
            }
        }

        Ok(links)
    }

    /// Number of listing pages; 1 when there is no pagination
    pub fn last_page(&self, body: &str) -> u32 {
        let html = Html::parse_document(body);
        select_first(&html, &self.last_page_selectors)
            .and_then(|element| clean_text(&element_text(&element)).parse::<u32>().ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }
}

fn parse_base(base_url: &str) -> ParsingResult<Url> {
    Url::parse(base_url).map_err(|e| ParsingError::UrlResolutionFailed {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

impl ContextualParser for ProductListParser {
    type Output = Vec<CrawlItem>;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let base = parse_base(&context.base_url)?;
        let mut items = Vec::new();

        for selector in &self.product_container_selectors {
            for (index, tile) in html.select(selector).enumerate() {
                let Some(href) = select_first_in(&tile, &self.link_selectors).and_then(|a| a.value().attr("href"))
                else {
                    debug!("Tile {} on page {} has no product link", index, context.page);
                    continue;
                };

                let product_href = match base.join(href) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        warn!("Skipping tile {} on page {}: bad href '{}': {}", index, context.page, href, e);
                        continue;
                    }
                };

                let title = select_first_in(&tile, &self.title_selectors)
                    .map(|element| clean_text(&element_text(&element)))
                    .filter(|t| !t.is_empty());

                items.push(CrawlItem::from_listing(product_href, title, &context.provenance));
            }
            if !items.is_empty() {
                break;
            }
        }

        debug!("Extracted {} items from page {}", items.len(), context.page);
        Ok(items)
    }
}
