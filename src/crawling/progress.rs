//! Crawl checkpointing
//!
//! The cursor file holds one integer: every item below it has a line in the
//! output log. The cursor only moves over a contiguous run of successes, so a
//! failed item is retried on the next run and the value never decreases.
//! Items past the cursor that already have a log line (they succeeded after an
//! earlier item failed) are recognised by `href` and not fetched again.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::CrawlError;
use crate::domain::{CrawlItem, DetailRecord};

/// Read the cursor; a missing or blank file means "start from 0"
pub async fn load_progress(path: &Path) -> Result<usize, CrawlError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CrawlError::checkpoint(path, e)),
    };

    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed
        .parse::<usize>()
        .map_err(|e| CrawlError::checkpoint(path, format!("invalid cursor '{}': {}", trimmed, e)))
}

/// Replace the cursor file atomically (temp file + rename)
pub async fn persist_progress(path: &Path, cursor: usize) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| CrawlError::checkpoint(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, cursor.to_string())
        .await
        .map_err(|e| CrawlError::checkpoint(&temp_path, e))?;
    fs::rename(&temp_path, path)
        .await
        .map_err(|e| CrawlError::checkpoint(path, e))
}

/// Output log as found on disk
struct ExistingLog {
    /// `href` of every complete record
    hrefs: HashSet<String>,
    /// Last line was cut short and lacks its newline
    unterminated: bool,
}

async fn load_existing_log(path: &Path) -> Result<ExistingLog, CrawlError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ExistingLog {
                hrefs: HashSet::new(),
                unterminated: false,
            });
        }
        Err(e) => return Err(CrawlError::checkpoint(path, e)),
    };

    let mut hrefs = HashSet::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => {
                if let Some(href) = value.get("href").and_then(|h| h.as_str()) {
                    hrefs.insert(href.to_string());
                }
            }
            // Usually a line cut short by a crash
            Err(e) => warn!("⚠️ Ignoring unreadable line {} in {}: {}", line_no + 1, path.display(), e),
        }
    }
    Ok(ExistingLog {
        hrefs,
        unterminated: !content.is_empty() && !content.ends_with('\n'),
    })
}

struct CoordinatorState {
    log: File,
    cursor: usize,
    /// Per item: has a line in the output log
    done: Vec<bool>,
}

impl CoordinatorState {
    /// Move the cursor over the contiguous run of finished items
    fn advance(&mut self) -> bool {
        let before = self.cursor;
        while self.cursor < self.done.len() && self.done[self.cursor] {
            self.cursor += 1;
        }
        self.cursor != before
    }
}

/// Sole owner of the output log and the cursor file
pub struct CrawlCoordinator {
    output_path: PathBuf,
    progress_path: PathBuf,
    state: Mutex<CoordinatorState>,
    pending: Vec<usize>,
    skipped: usize,
}

impl CrawlCoordinator {
    /// Load the cursor and the log, and work out which items still need fetching
    pub async fn open(output_path: &Path, progress_path: &Path, items: &[CrawlItem]) -> Result<Self, CrawlError> {
        let start = load_progress(progress_path).await?;
        let existing = load_existing_log(output_path).await?;

        let mut done = vec![false; items.len()];
        let mut pending = Vec::new();
        let mut skipped = 0;
        for (index, item) in items.iter().enumerate().skip(start) {
            if existing.hrefs.contains(&item.product_href) {
                done[index] = true;
                skipped += 1;
            } else {
                pending.push(index);
            }
        }
        // Items below the cursor are finished by definition
        for flag in done.iter_mut().take(start) {
            *flag = true;
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| CrawlError::checkpoint(parent, e))?;
        }
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_path)
            .await
            .map_err(|e| CrawlError::checkpoint(output_path, e))?;
        if existing.unterminated {
            log.write_all(b"\n")
                .await
                .map_err(|e| CrawlError::checkpoint(output_path, e))?;
            log.flush().await.map_err(|e| CrawlError::checkpoint(output_path, e))?;
        }

        let mut state = CoordinatorState {
            log,
            cursor: start,
            done,
        };
        if state.advance() {
            persist_progress(progress_path, state.cursor).await?;
        }

        info!(
            "📋 Resuming at item {} of {}: {} pending, {} already in {}",
            state.cursor,
            items.len(),
            pending.len(),
            skipped,
            output_path.display()
        );

        Ok(Self {
            output_path: output_path.to_path_buf(),
            progress_path: progress_path.to_path_buf(),
            state: Mutex::new(state),
            pending,
            skipped,
        })
    }

    /// Item indices still to fetch, ascending
    pub fn pending(&self) -> &[usize] {
        &self.pending
    }

    /// Items at or past the cursor that were already in the log
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub async fn cursor(&self) -> usize {
        self.state.lock().await.cursor
    }

    pub async fn is_done(&self, index: usize) -> bool {
        self.state.lock().await.done.get(index).copied().unwrap_or(false)
    }

    /// Append the record, then move and persist the cursor
    pub async fn record_success(&self, index: usize, record: &DetailRecord) -> Result<(), CrawlError> {
        let mut line = serde_json::to_string(record).map_err(|e| CrawlError::checkpoint(&self.output_path, e))?;
        line.push('\n');

        let mut state = self.state.lock().await;
        state
            .log
            .write_all(line.as_bytes())
            .await
            .map_err(|e| CrawlError::checkpoint(&self.output_path, e))?;
        state
            .log
            .flush()
            .await
            .map_err(|e| CrawlError::checkpoint(&self.output_path, e))?;

        if let Some(flag) = state.done.get_mut(index) {
            *flag = true;
        }
        state.advance();
        let cursor = state.cursor;
        persist_progress(&self.progress_path, cursor).await?;
        debug!("Item {} recorded, cursor at {}", index, cursor);
        Ok(())
    }

    /// The cursor stays where it is; it is re-persisted so the file always
    /// reflects the latest outcome
    pub async fn record_failure(&self, index: usize) -> Result<(), CrawlError> {
        let state = self.state.lock().await;
        persist_progress(&self.progress_path, state.cursor).await?;
        debug!("Item {} failed, cursor held at {}", index, state.cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn items(n: usize) -> Vec<CrawlItem> {
        (0..n).map(|i| CrawlItem::new(format!("https://groceries.example/product/{}", i))).collect()
    }

    fn record(i: usize) -> DetailRecord {
        DetailRecord {
            title: format!("Item {}", i),
            href: format!("https://groceries.example/product/{}", i),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_progress_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("progress.txt");

        assert_eq!(load_progress(&path).await.unwrap(), 0);
        persist_progress(&path, 17).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "17");
        assert_eq!(load_progress(&path).await.unwrap(), 17);

        std::fs::write(&path, "seventeen").unwrap();
        assert!(matches!(load_progress(&path).await, Err(CrawlError::CheckpointIo { .. })));
    }

    #[tokio::test]
    async fn test_cursor_waits_for_earliest_failure() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let progress = dir.path().join("progress.txt");
        let items = items(4);

        let coordinator = CrawlCoordinator::open(&output, &progress, &items).await.unwrap();
        assert_eq!(coordinator.pending(), &[0, 1, 2, 3]);

        coordinator.record_success(0, &record(0)).await.unwrap();
        coordinator.record_failure(1).await.unwrap();
        coordinator.record_success(3, &record(3)).await.unwrap();
        coordinator.record_success(2, &record(2)).await.unwrap();

        assert_eq!(coordinator.cursor().await, 1);
        assert_eq!(load_progress(&progress).await.unwrap(), 1);
        assert!(coordinator.is_done(3).await);
        assert!(!coordinator.is_done(1).await);

        coordinator.record_success(1, &record(1)).await.unwrap();
        assert_eq!(coordinator.cursor().await, 4);
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 4);
    }

    #[tokio::test]
    async fn test_reopen_skips_logged_items_past_cursor() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let progress = dir.path().join("progress.txt");
        let items = items(5);

        {
            let coordinator = CrawlCoordinator::open(&output, &progress, &items).await.unwrap();
            coordinator.record_success(0, &record(0)).await.unwrap();
            coordinator.record_failure(1).await.unwrap();
            coordinator.record_success(3, &record(3)).await.unwrap();
        }
        // Half-written line from a crash
        let mut log = std::fs::read_to_string(&output).unwrap();
        log.push_str("{\"title\": \"Item 4\", \"hre");
        std::fs::write(&output, log).unwrap();

        let reopened = CrawlCoordinator::open(&output, &progress, &items).await.unwrap();
        assert_eq!(reopened.cursor().await, 1);
        assert_eq!(reopened.pending(), &[1, 2, 4]);
        assert_eq!(reopened.skipped(), 1);

        reopened.record_success(1, &record(1)).await.unwrap();
        let last_line = std::fs::read_to_string(&output).unwrap().lines().last().unwrap().to_string();
        assert_eq!(serde_json::from_str::<DetailRecord>(&last_line).unwrap(), record(1));
    }

    #[tokio::test]
    async fn test_open_advances_over_logged_prefix() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let progress = dir.path().join("progress.txt");
        let items = items(3);
        persist_progress(&progress, 1).await.unwrap();
        std::fs::write(&output, format!("{}\n", serde_json::to_string(&record(1)).unwrap())).unwrap();

        let coordinator = CrawlCoordinator::open(&output, &progress, &items).await.unwrap();

        assert_eq!(coordinator.cursor().await, 2);
        assert_eq!(load_progress(&progress).await.unwrap(), 2);
        assert_eq!(coordinator.pending(), &[2]);
    }
}
