//! `crawl`: resumable detail scraping over a discovered item list

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::crawling::{BrowserPageSource, CrawlSummary, HttpPageSource, PageSource, ResumableCrawlPool};
use crate::domain::CrawlItem;
use crate::infrastructure::config::{AppConfig, CrawlConfig, PageRenderer};
use crate::infrastructure::{HttpClientConfig, ProductDetailParser};

/// Load the JSON item array written by `discover`
pub async fn load_items(path: &Path) -> Result<Vec<CrawlItem>> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read item list {}", path.display()))?;
    let items: Vec<CrawlItem> =
        serde_json::from_slice(&bytes).with_context(|| format!("Item list {} is not a JSON array of items", path.display()))?;

    info!("📂 Loaded {} items from {}", items.len(), path.display());
    Ok(items)
}

/// Page source for the configured renderer
pub fn page_source(crawl: &CrawlConfig) -> Arc<dyn PageSource> {
    match crawl.renderer {
        PageRenderer::Headless => Arc::new(
            BrowserPageSource::new(
                crawl.user_agent.clone(),
                crawl.request_timeout_seconds,
                crawl.network_idle_timeout_seconds,
            )
            .with_executable(crawl.browser_executable.clone()),
        ),
        PageRenderer::Http => Arc::new(HttpPageSource::new(HttpClientConfig::new(
            crawl.user_agent.clone(),
            crawl.request_timeout_seconds,
        ))),
    }
}

pub async fn run_crawl(config: &AppConfig) -> Result<CrawlSummary> {
    let crawl = &config.crawl;
    let items = load_items(&crawl.items_file).await?;

    let parser = ProductDetailParser::with_config(&config.parsing.product_detail_selectors)
        .context("Invalid product detail selectors")?;
    info!("🧭 Loading detail pages with the {:?} renderer", crawl.renderer);

    let pool = ResumableCrawlPool::new(
        page_source(crawl),
        Arc::new(parser),
        &crawl.output_file,
        &crawl.progress_file,
        crawl.workers,
    );

    let summary = pool.run(items).await?;
    Ok(summary)
}
