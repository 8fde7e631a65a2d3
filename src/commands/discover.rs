//! `discover`: build the crawl item list from aisle listing pages
//!
//! Every page of the aisle is parsed for product tiles. New items are
//! appended to the item file, so indices already covered by a crawl cursor
//! keep pointing at the same products.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use url::Url;

use crate::crawling::{HttpPageSource, PageSource};
use crate::domain::{CrawlItem, Provenance};
use crate::infrastructure::config::{AppConfig, groceries};
use crate::infrastructure::parsing::{ParseContext, ProductListParser, TaxonomyLink};
use crate::infrastructure::HttpClientConfig;

#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    /// First listing page of the aisle
    pub aisle_url: String,
    /// Labels stamped on every discovered item
    pub provenance: Provenance,
    /// Item list to create or extend
    pub out: PathBuf,
}

/// URL of listing page `page` of an aisle
pub fn page_url(aisle_url: &str, page: u32) -> Result<String> {
    let mut url = Url::parse(aisle_url).with_context(|| format!("Invalid aisle URL '{}'", aisle_url))?;
    let others: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != groceries::PAGE_QUERY_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(others)
        .append_pair(groceries::PAGE_QUERY_PARAM, &page.to_string());
    Ok(url.to_string())
}

/// Append items whose href is not yet present; returns how many were added
pub fn merge_items(existing: &mut Vec<CrawlItem>, discovered: Vec<CrawlItem>) -> usize {
    let mut seen: HashSet<String> = existing.iter().map(|item| item.product_href.clone()).collect();
    let before = existing.len();
    for item in discovered {
        if seen.insert(item.product_href.clone()) {
            existing.push(item);
        }
    }
    existing.len() - before
}

async fn read_existing(path: &Path) -> Result<Vec<CrawlItem>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("Existing item list {} is not a JSON array of items", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn write_items(path: &Path, items: &[CrawlItem]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let content = serde_json::to_vec_pretty(items).context("Failed to serialize item list")?;
    tokio::fs::write(&temp_path, content)
        .await
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    tokio::fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))
}

/// Walk every listing page of the aisle; pages that fail are logged and skipped
pub async fn discover_items(
    pages: &dyn PageSource,
    parser: &ProductListParser,
    base_url: &str,
    request: &DiscoverRequest,
) -> Result<Vec<CrawlItem>> {
    let first_url = page_url(&request.aisle_url, 1)?;
    let first_page = pages
        .fetch_page(&first_url)
        .await
        .with_context(|| format!("Failed to fetch aisle page {}", first_url))?;
    let last_page = parser.last_page(&first_page);
    info!("🌐 {} has {} listing pages", request.aisle_url, last_page);

    let mut items = Vec::new();
    for page in 1..=last_page {
        let body = if page == 1 {
            first_page.clone()
        } else {
            let url = page_url(&request.aisle_url, page)?;
            match pages.fetch_page(&url).await {
                Ok(body) => body,
                Err(e) => {
                    error!("❌ Listing page {} failed: {}", url, e);
                    continue;
                }
            }
        };

        let context = ParseContext::new(page, base_url).with_provenance(request.provenance.clone());
        match parser.parse_items(&body, &context) {
            Ok(found) => {
                info!("📋 Page {}/{}: {} products", page, last_page, found.len());
                items.extend(found);
            }
            Err(e) => warn!("⚠️ Page {} could not be parsed: {}", page, e),
        }
    }
    Ok(items)
}

pub async fn run_discover(config: &AppConfig, request: &DiscoverRequest) -> Result<usize> {
    let parser = ProductListParser::with_config(&config.parsing.product_list_selectors)
        .context("Invalid product list selectors")?;
    let pages = HttpPageSource::new(HttpClientConfig::new(
        config.crawl.user_agent.clone(),
        config.crawl.request_timeout_seconds,
    ));

    let discovered = discover_items(&pages, &parser, &config.parsing.base_url, request).await?;
    let mut items = read_existing(&request.out).await?;
    let added = merge_items(&mut items, discovered);
    write_items(&request.out, &items).await?;

    info!("✅ Added {} new items, {} total in {}", added, items.len(), request.out.display());
    Ok(added)
}

/// Navigation buttons on a category or department page
pub async fn list_taxonomy(config: &AppConfig, url: &str) -> Result<Vec<TaxonomyLink>> {
    let parser = ProductListParser::with_config(&config.parsing.product_list_selectors)
        .context("Invalid product list selectors")?;
    let pages = HttpPageSource::new(HttpClientConfig::new(
        config.crawl.user_agent.clone(),
        config.crawl.request_timeout_seconds,
    ));

    let body = pages
        .fetch_page(url)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;
    let links = parser
        .parse_taxonomy_links(&body, &config.parsing.base_url)
        .context("Failed to parse navigation links")?;
    Ok(links)
}
