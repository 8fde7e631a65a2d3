//! Parsing context for HTML extraction

use crate::domain::Provenance;

/// Context for a listing (aisle) page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// 1-based listing page number
    pub page: u32,

    /// Base URL for resolving relative links
    pub base_url: String,

    /// Labels copied onto every discovered item
    pub provenance: Provenance,
}

impl ParseContext {
    pub fn new(page: u32, base_url: impl Into<String>) -> Self {
        Self {
            page,
            base_url: base_url.into(),
            provenance: Provenance::default(),
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Context for a product detail page
#[derive(Debug, Clone)]
pub struct DetailParseContext {
    /// Product URL being parsed; recorded as `href`
    pub url: String,
}

impl DetailParseContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}
