use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Labels inherited from the discovery phase (category page → department → aisle)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub category: Option<String>,
    pub department: Option<String>,
    pub aisle: Option<String>,
}

/// One product to be detail-scraped.
///
/// Item lists are plain JSON arrays; unknown keys written by older
/// discovery runs (prices, promo labels, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlItem {
    pub product_href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aisle: Option<String>,
}

impl CrawlItem {
    pub fn new(product_href: impl Into<String>) -> Self {
        Self {
            product_href: product_href.into(),
            title: None,
            category: None,
            department: None,
            aisle: None,
        }
    }

    pub fn from_listing(product_href: String, title: Option<String>, provenance: &Provenance) -> Self {
        Self {
            product_href,
            title,
            category: provenance.category.clone(),
            department: provenance.department.clone(),
            aisle: provenance.aisle.clone(),
        }
    }
}

/// Breadcrumb-derived classification hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classifications {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aisle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shelf: Option<String>,
}

impl Classifications {
    /// Breadcrumb levels in page order
    pub const LEVELS: [&'static str; 4] = ["category", "department", "aisle", "shelf"];

    pub fn set_level(&mut self, level: usize, value: String) {
        match level {
            0 => self.category = Some(value),
            1 => self.department = Some(value),
            2 => self.aisle = Some(value),
            3 => self.shelf = Some(value),
            _ => {}
        }
    }
}

/// Structured fields scraped from one product detail page.
///
/// `title`, `price` and `was_price` are always written (null when absent);
/// free-text detail sections are flattened as extra snake_case keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub title: String,
    pub price: Option<String>,
    pub was_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_uom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifications: Option<Classifications>,
    pub href: String,
    #[serde(flatten)]
    pub details: BTreeMap<String, String>,
}
