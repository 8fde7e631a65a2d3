//! Resumable product detail crawling
//!
//! - `page_source`: fetches one detail page per item, fresh session each time
//! - `browser_source`: headless Chromium rendering, one browser per item
//! - `progress`: the output log and the progress cursor, behind one lock
//! - `worker_pool`: bounded set of tokio workers over an immutable item list

use std::path::PathBuf;

use thiserror::Error;

pub mod browser_source;
pub mod page_source;
pub mod progress;
pub mod worker_pool;

pub use browser_source::BrowserPageSource;
pub use page_source::{HttpPageSource, PageSource};
pub use progress::{CrawlCoordinator, load_progress};
pub use worker_pool::{CrawlSummary, ResumableCrawlPool};

#[derive(Error, Debug, Clone)]
pub enum CrawlError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Checkpoint I/O error at {path}: {message}")]
    CheckpointIo { path: PathBuf, message: String },

    #[error("Worker task failed: {0}")]
    WorkerPanicked(String),
}

impl CrawlError {
    /// Failures confined to one item; the run continues and the item is retried next time
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            CrawlError::NetworkError(_) | CrawlError::HttpError(..) | CrawlError::ParseError(_) | CrawlError::InvalidInput(_)
        )
    }

    pub(crate) fn checkpoint(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        CrawlError::CheckpointIo {
            path: path.into(),
            message: error.to_string(),
        }
    }
}
