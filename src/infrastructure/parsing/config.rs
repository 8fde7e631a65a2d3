//! Parsing configuration for HTML extraction
//!
//! Centralized CSS selectors for the grocery pages. Field selectors are
//! ordered fallback lists; the first one that matches wins.

use serde::{Deserialize, Serialize};

use crate::infrastructure::config::groceries;

/// Main parsing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Base URL for resolving relative links
    pub base_url: String,

    /// Listing page selectors
    pub product_list_selectors: ProductListSelectors,

    /// Product detail selectors
    pub product_detail_selectors: ProductDetailSelectors,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            base_url: groceries::BASE_URL.to_string(),
            product_list_selectors: ProductListSelectors::default(),
            product_detail_selectors: ProductDetailSelectors::default(),
        }
    }
}

/// CSS selectors for listing (aisle) pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductListSelectors {
    /// Product tile containers
    pub product_container: Vec<String>,

    /// Title inside a tile
    pub title: Vec<String>,

    /// Product detail link inside a tile
    pub product_link: Vec<String>,

    /// Category / department / aisle navigation buttons
    pub taxonomy_link: Vec<String>,

    /// Link holding the last page number
    pub last_page: Vec<String>,
}

impl Default for ProductListSelectors {
    fn default() -> Self {
        Self {
            product_container: vec!["li.co-item".to_string()],
            title: vec!["h3.co-product__title a".to_string(), "h3.co-product__title".to_string()],
            product_link: vec!["a.co-product__anchor".to_string()],
            taxonomy_link: vec!["div.taxonomy-explore a.taxonomy-explore__item".to_string()],
            last_page: vec!["a.co-pagination__last-page".to_string()],
        }
    }
}

/// CSS selectors for product detail pages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDetailSelectors {
    pub title: Vec<String>,
    pub price: Vec<String>,
    pub was_price: Vec<String>,
    pub price_per_uom: Vec<String>,
    pub weight: Vec<String>,
    pub product_code: Vec<String>,

    /// Free-text "product details" sections and their title/content parts
    pub details_section: String,
    pub details_title: String,
    pub details_content: String,

    /// Breadcrumb links, in category → department → aisle → shelf order
    pub breadcrumb_container: String,
    pub breadcrumb_link: String,
}

impl Default for ProductDetailSelectors {
    fn default() -> Self {
        Self {
            title: vec!["h1.pdp-main-details__title".to_string()],
            price: vec!["strong.co-product__price.pdp-main-details__price".to_string()],
            was_price: vec!["span.co-product__was-price".to_string()],
            price_per_uom: vec!["span.co-product__price-per-uom".to_string()],
            weight: vec!["div.pdp-main-details__weight".to_string()],
            product_code: vec!["span.pdp-main-details__product-code".to_string()],
            details_section: "div.pdp-description-reviews__product-details-cntr".to_string(),
            details_title: "div.pdp-description-reviews__product-details-title".to_string(),
            details_content: "div.pdp-description-reviews__product-details-content".to_string(),
            breadcrumb_container: r#"div[data-auto-id="pdpBreadcrumb"]"#.to_string(),
            breadcrumb_link: "a.breadcrumb__link".to_string(),
        }
    }
}
