//! Bounded worker pool over the crawl item list
//!
//! Workers pull the next pending index from a shared counter; the item list
//! itself is immutable and read without locking. Every outcome goes through
//! the `CrawlCoordinator`.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::CrawlError;
use super::page_source::PageSource;
use super::progress::CrawlCoordinator;
use crate::domain::{CrawlItem, DetailRecord};
use crate::infrastructure::parsing::{DetailParseContext, ProductDetailParser};

/// Counts for one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Already present in the output log before this run
    pub skipped: usize,
    /// Cursor after the run
    pub cursor: usize,
}

#[derive(Default)]
struct Counters {
    attempted: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

pub struct ResumableCrawlPool {
    pages: Arc<dyn PageSource>,
    parser: Arc<ProductDetailParser>,
    output_path: PathBuf,
    progress_path: PathBuf,
    workers: usize,
}

impl ResumableCrawlPool {
    pub fn new(
        pages: Arc<dyn PageSource>,
        parser: Arc<ProductDetailParser>,
        output_path: impl Into<PathBuf>,
        progress_path: impl Into<PathBuf>,
        workers: usize,
    ) -> Self {
        Self {
            pages,
            parser,
            output_path: output_path.into(),
            progress_path: progress_path.into(),
            workers: workers.max(1),
        }
    }

    /// Process every item not yet in the output log.
    ///
    /// Item failures are logged and counted. A checkpoint I/O failure or a
    /// panicking worker stops only that worker; the first such error is
    /// returned once all workers have finished.
    pub async fn run(&self, items: Vec<CrawlItem>) -> Result<CrawlSummary, CrawlError> {
        let coordinator = Arc::new(CrawlCoordinator::open(&self.output_path, &self.progress_path, &items).await?);
        let items: Arc<[CrawlItem]> = items.into();
        let pending: Arc<[usize]> = coordinator.pending().into();
        let next = Arc::new(AtomicUsize::new(0));
        let counters = Arc::new(Counters::default());

        let worker_count = self.workers.min(pending.len()).max(1);
        info!("🚀 Crawling {} items with {} workers", pending.len(), worker_count);

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let pages = Arc::clone(&self.pages);
            let parser = Arc::clone(&self.parser);
            let coordinator = Arc::clone(&coordinator);
            let items = Arc::clone(&items);
            let pending = Arc::clone(&pending);
            let next = Arc::clone(&next);
            let counters = Arc::clone(&counters);

            workers.spawn(async move {
                loop {
                    let slot = next.fetch_add(1, Ordering::SeqCst);
                    let Some(&index) = pending.get(slot) else {
                        break;
                    };
                    let item = &items[index];
                    counters.attempted.fetch_add(1, Ordering::SeqCst);

                    match process_item(pages.as_ref(), &parser, item).await {
                        Ok(record) => {
                            coordinator.record_success(index, &record).await?;
                            counters.succeeded.fetch_add(1, Ordering::SeqCst);
                            info!("✅ Processed product {}: {}", index + 1, record.title);
                        }
                        Err(e) => {
                            error!("❌ Error processing product {} ({}): {}", index + 1, item.product_href, e);
                            counters.failed.fetch_add(1, Ordering::SeqCst);
                            coordinator.record_failure(index).await?;
                        }
                    }
                }
                debug!("Worker {} finished", worker_id);
                Ok::<(), CrawlError>(())
            });
        }

        let mut first_error = None;
        while let Some(joined) = workers.join_next().await {
            let failure = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_error) => CrawlError::WorkerPanicked(join_error.to_string()),
            };
            warn!("⚠️ Crawl worker stopped: {}", failure);
            first_error.get_or_insert(failure);
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let summary = CrawlSummary {
            attempted: counters.attempted.load(Ordering::SeqCst),
            succeeded: counters.succeeded.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            skipped: coordinator.skipped(),
            cursor: coordinator.cursor().await,
        };
        info!(
            "🏁 Crawl finished: {} succeeded, {} failed, {} skipped, cursor at {}",
            summary.succeeded, summary.failed, summary.skipped, summary.cursor
        );
        Ok(summary)
    }
}

async fn process_item(pages: &dyn PageSource, parser: &ProductDetailParser, item: &CrawlItem) -> Result<DetailRecord, CrawlError> {
    let body = pages.fetch_page(&item.product_href).await?;
    parser
        .parse_document(&body, &DetailParseContext::new(item.product_href.clone()))
        .map_err(|e| CrawlError::ParseError(e.to_string()))
}
