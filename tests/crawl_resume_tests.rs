//! Crash/resume behaviour of the detail crawler against a recording page source
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use petro_ingest_lib::crawling::{CrawlError, PageSource, ResumableCrawlPool, load_progress};
use petro_ingest_lib::domain::{CrawlItem, DetailRecord};
use petro_ingest_lib::infrastructure::ProductDetailParser;
use tempfile::tempdir;

fn detail_page(title: &str, was_price: Option<&str>) -> String {
    let was = was_price
        .map(|w| format!(r#"<span class="co-product__was-price">{}</span>"#, w))
        .unwrap_or_default();
    format!(
        r#"<html><body>
        <h1 class="pdp-main-details__title">{title}</h1>
        <strong class="co-product__price pdp-main-details__price">£1.50</strong>
        {was}
        </body></html>"#
    )
}

/// Records every URL requested; URLs in `failing` answer with a 503
struct RecordingPages {
    failing: HashSet<String>,
    requested: Mutex<Vec<String>>,
}

impl RecordingPages {
    fn new(failing: &[String]) -> Self {
        Self {
            failing: failing.iter().cloned().collect(),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn requested(&self) -> Vec<String> {
        let mut urls = self.requested.lock().unwrap().clone();
        urls.sort();
        urls
    }
}

#[async_trait]
impl PageSource for RecordingPages {
    async fn fetch_page(&self, url: &str) -> Result<String, CrawlError> {
        self.requested.lock().unwrap().push(url.to_string());
        if self.failing.contains(url) {
            return Err(CrawlError::HttpError(503, format!("HTTP 503 for {}", url)));
        }
        Ok(detail_page(&format!("Product at {}", url), None))
    }
}

fn href(i: usize) -> String {
    format!("https://groceries.example/product/item/{:03}", i)
}

fn items(n: usize) -> Vec<CrawlItem> {
    (0..n).map(|i| CrawlItem::new(href(i))).collect()
}

fn pool(pages: Arc<RecordingPages>, dir: &Path, workers: usize) -> ResumableCrawlPool {
    ResumableCrawlPool::new(
        pages,
        Arc::new(ProductDetailParser::new().unwrap()),
        dir.join("details.json"),
        dir.join("progress.txt"),
        workers,
    )
}

fn logged_hrefs(dir: &Path) -> Vec<String> {
    let content = std::fs::read_to_string(dir.join("details.json")).unwrap();
    let mut hrefs: Vec<String> = content
        .lines()
        .map(|line| serde_json::from_str::<DetailRecord>(line).unwrap().href)
        .collect();
    hrefs.sort();
    hrefs
}

#[tokio::test]
async fn resume_retries_from_cursor_and_never_below_it() {
    let dir = tempdir().unwrap();

    // First run: item 4 keeps failing
    let first = Arc::new(RecordingPages::new(&[href(4)]));
    let summary = pool(Arc::clone(&first), dir.path(), 3).run(items(10)).await.unwrap();
    assert_eq!(summary.succeeded, 9);
    assert_eq!(summary.cursor, 4);
    assert_eq!(load_progress(&dir.path().join("progress.txt")).await.unwrap(), 4);

    // Second run: only the failed item is fetched again
    let second = Arc::new(RecordingPages::new(&[]));
    let summary = pool(Arc::clone(&second), dir.path(), 3).run(items(10)).await.unwrap();
    assert_eq!(second.requested(), vec![href(4)]);
    assert_eq!(summary.skipped, 5);
    assert_eq!(summary.cursor, 10);

    // Every item is logged exactly once
    let expected: Vec<String> = (0..10).map(href).collect();
    assert_eq!(logged_hrefs(dir.path()), expected);

    // Nothing left to do
    let third = Arc::new(RecordingPages::new(&[]));
    let summary = pool(Arc::clone(&third), dir.path(), 3).run(items(10)).await.unwrap();
    assert!(third.requested().is_empty());
    assert_eq!(summary.attempted, 0);
}

#[tokio::test]
async fn cursor_written_before_crash_is_respected() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("progress.txt"), "6").unwrap();

    let pages = Arc::new(RecordingPages::new(&[]));
    let summary = pool(Arc::clone(&pages), dir.path(), 2).run(items(8)).await.unwrap();

    assert_eq!(pages.requested(), vec![href(6), href(7)]);
    assert_eq!(summary.cursor, 8);
}

#[tokio::test]
async fn cursor_never_decreases_across_runs() {
    let dir = tempdir().unwrap();
    let progress = dir.path().join("progress.txt");
    let mut last = 0;

    for failing in [vec![href(2), href(5)], vec![href(5)], vec![], vec![]] {
        let pages = Arc::new(RecordingPages::new(&failing));
        pool(pages, dir.path(), 4).run(items(8)).await.unwrap();
        let cursor = load_progress(&progress).await.unwrap();
        assert!(cursor >= last, "cursor went from {} to {}", last, cursor);
        last = cursor;
    }
    assert_eq!(last, 8);
}

/// Serves one fixed page
struct FixedPage(String);

#[async_trait]
impl PageSource for FixedPage {
    async fn fetch_page(&self, _url: &str) -> Result<String, CrawlError> {
        Ok(self.0.clone())
    }
}

#[tokio::test]
async fn missing_was_price_is_logged_as_null() {
    let dir = tempdir().unwrap();
    let pool = ResumableCrawlPool::new(
        Arc::new(FixedPage(detail_page("Semi Skimmed Milk 4 Pints", None))),
        Arc::new(ProductDetailParser::new().unwrap()),
        dir.path().join("details.json"),
        dir.path().join("progress.txt"),
        1,
    );

    pool.run(items(1)).await.unwrap();

    let line = std::fs::read_to_string(dir.path().join("details.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(value["title"], "Semi Skimmed Milk 4 Pints");
    assert_eq!(value["price"], "1.50");
    assert!(value.get("was_price").is_some());
    assert!(value["was_price"].is_null());
    assert_eq!(value["href"], href(0));
}

#[tokio::test]
async fn was_price_is_kept_when_present() {
    let dir = tempdir().unwrap();
    let pool = ResumableCrawlPool::new(
        Arc::new(FixedPage(detail_page("Butter 250g", Some("was £2.10")))),
        Arc::new(ProductDetailParser::new().unwrap()),
        dir.path().join("details.json"),
        dir.path().join("progress.txt"),
        1,
    );

    pool.run(items(1)).await.unwrap();

    let line = std::fs::read_to_string(dir.path().join("details.json")).unwrap();
    let record: DetailRecord = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record.was_price.as_deref(), Some("2.10"));
}
