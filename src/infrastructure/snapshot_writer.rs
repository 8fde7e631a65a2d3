//! Raw feed snapshots
//!
//! Every fetched feed is persisted unchanged at
//! `{root}/{slug}/{slug}_{YYYY-MM-DD_HH-MM-SS}.json`. Snapshots are write-once:
//! a file is written to a temporary name and hard-linked into place, so an
//! existing snapshot is never replaced, even by a concurrent writer.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::domain::{FeedRecord, SnapshotName, TimestampError, TimestampPolicy};

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("cannot derive snapshot timestamp for {source_name}: {error}")]
    Timestamp {
        source_name: String,
        error: TimestampError,
    },

    #[error("snapshot already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("snapshot I/O error at {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(String),
}

/// One snapshot file found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub name: SnapshotName,
    pub path: PathBuf,
}

/// All snapshots of one source directory, sorted by file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSnapshots {
    pub slug: String,
    pub snapshots: Vec<StoredSnapshot>,
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
}

impl SnapshotWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical name for a record under the given source policy
    pub fn snapshot_name(record: &FeedRecord, policy: TimestampPolicy) -> Result<SnapshotName, SnapshotError> {
        let timestamp = record
            .last_updated(policy)
            .map_err(|error| SnapshotError::Timestamp {
                source_name: record.source.clone(),
                error,
            })?;
        Ok(SnapshotName::new(&record.source, timestamp))
    }

    /// Persist the raw payload; returns the final path
    pub async fn write(&self, record: &FeedRecord, policy: TimestampPolicy) -> Result<PathBuf, SnapshotError> {
        let name = Self::snapshot_name(record, policy)?;
        let dir = self.root.join(&name.slug);
        let path = dir.join(name.to_string());

        fs::create_dir_all(&dir).await.map_err(|e| io_error(&dir, e))?;

        let body = serde_json::to_vec(&record.payload).map_err(|e| SnapshotError::Serialize(e.to_string()))?;

        let temp_path = dir.join(format!(".{}.tmp", name));
        if let Err(e) = fs::write(&temp_path, &body).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(io_error(&temp_path, e));
        }

        // `hard_link` refuses an existing target, unlike `rename`
        let linked = fs::hard_link(&temp_path, &path).await;
        let _ = fs::remove_file(&temp_path).await;
        match linked {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(SnapshotError::AlreadyExists(path));
            }
            Err(e) => return Err(io_error(&path, e)),
        }

        info!("💾 Saved {} snapshot: {}", record.source, path.display());
        Ok(path)
    }
}

/// List `{root}/{slug}/*.json` snapshots, sources sorted by slug and files by name.
///
/// Files whose names are not snapshot names are skipped with a warning; a
/// missing root yields an empty list. Only an unreadable root is an error: a
/// source directory that cannot be listed is skipped with a warning.
pub async fn scan_snapshots(root: &Path) -> Result<Vec<SourceSnapshots>, SnapshotError> {
    if !fs::try_exists(root).await.unwrap_or(false) {
        warn!("⚠️ Snapshot root {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut source_dirs = Vec::new();
    let mut entries = fs::read_dir(root).await.map_err(|e| io_error(root, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(root, e))? {
        // Symlinked source directories are followed
        let candidate = entry
            .file_type()
            .await
            .map(|t| t.is_dir() || t.is_symlink())
            .unwrap_or(false);
        if candidate {
            if let Some(slug) = entry.file_name().to_str() {
                source_dirs.push((slug.to_string(), entry.path()));
            }
        }
    }
    source_dirs.sort();

    let mut result = Vec::with_capacity(source_dirs.len());
    for (slug, dir) in source_dirs {
        match scan_source_dir(&dir).await {
            Ok(snapshots) => result.push(SourceSnapshots { slug, snapshots }),
            Err(e) => warn!("⚠️ Skipping snapshots of {}: {}", slug, e),
        }
    }

    Ok(result)
}

fn io_error(path: &Path, e: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

async fn scan_source_dir(dir: &Path) -> Result<Vec<StoredSnapshot>, SnapshotError> {
    let mut snapshots = Vec::new();
    let mut files = fs::read_dir(dir).await.map_err(|e| io_error(dir, e))?;
    while let Some(entry) = files.next_entry().await.map_err(|e| io_error(dir, e))? {
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if file_name.starts_with('.') || !file_name.ends_with(".json") {
            debug!("Skipping non-snapshot file {}", entry.path().display());
            continue;
        }
        match SnapshotName::parse(&file_name) {
            Ok(name) => snapshots.push(StoredSnapshot { name, path: entry.path() }),
            Err(e) => warn!("⚠️ Skipping {}: {}", entry.path().display(), e),
        }
    }
    snapshots.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn record(payload: serde_json::Value) -> FeedRecord {
        FeedRecord::new("Motor Fuel Group", payload)
            .with_retrieved_at(Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_write_uses_vendor_timestamp() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        let path = writer
            .write(&record(json!({ "last_updated": "02/06/2024 10:11:12", "stations": [] })), TimestampPolicy::Auto)
            .await
            .unwrap();

        assert_eq!(
            path,
            dir.path().join("motor-fuel-group").join("motor-fuel-group_2024-06-02_10-11-12.json")
        );
        let stored: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored["last_updated"], "02/06/2024 10:11:12");
    }

    #[tokio::test]
    async fn test_epoch_and_day_first_share_one_format() {
        let epoch = SnapshotWriter::snapshot_name(&record(json!({ "last_updated": 1_717_322_472 })), TimestampPolicy::Auto).unwrap();
        let text = SnapshotWriter::snapshot_name(&record(json!({ "last_updated": "02/06/2024 10:01:12" })), TimestampPolicy::Auto).unwrap();
        assert_eq!(epoch.formatted_timestamp(), "2024-06-02_10-01-12");
        assert_eq!(epoch, text);
    }

    #[tokio::test]
    async fn test_missing_timestamp_uses_retrieval_time() {
        let name = SnapshotWriter::snapshot_name(&record(json!({ "stations": [] })), TimestampPolicy::Auto).unwrap();
        assert_eq!(name.to_string(), "motor-fuel-group_2024-06-01_09-00-00.json");
    }

    #[tokio::test]
    async fn test_malformed_timestamp_is_rejected() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());

        let result = writer
            .write(&record(json!({ "last_updated": "2024-06-02T10:11:12Z" })), TimestampPolicy::Auto)
            .await;
        assert!(matches!(result, Err(SnapshotError::Timestamp { .. })));
        assert!(!dir.path().join("motor-fuel-group").exists());
    }

    #[tokio::test]
    async fn test_snapshots_are_write_once() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let first = record(json!({ "last_updated": 1_717_322_472, "stations": [1] }));
        let second = record(json!({ "last_updated": 1_717_322_472, "stations": [2] }));

        let path = writer.write(&first, TimestampPolicy::Auto).await.unwrap();
        let again = writer.write(&second, TimestampPolicy::Auto).await;

        assert!(matches!(again, Err(SnapshotError::AlreadyExists(_))));
        let stored: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored["stations"], json!([1]));
    }

    #[tokio::test]
    async fn test_scan_sorts_and_skips_foreign_files() {
        let dir = tempdir().unwrap();
        let bp = dir.path().join("bp");
        let asda = dir.path().join("asda");
        std::fs::create_dir_all(&bp).unwrap();
        std::fs::create_dir_all(&asda).unwrap();
        std::fs::write(bp.join("bp_2024-06-02_10-00-00.json"), "{}").unwrap();
        std::fs::write(bp.join("bp_2024-06-01_10-00-00.json"), "{}").unwrap();
        std::fs::write(bp.join("notes.txt"), "x").unwrap();
        std::fs::write(bp.join("bp_yesterday.json"), "{}").unwrap();
        std::fs::write(asda.join("asda_2024-06-01_08-00-00.json"), "{}").unwrap();

        let scanned = scan_snapshots(dir.path()).await.unwrap();
        assert_eq!(scanned.len(), 2);
        assert_eq!(scanned[0].slug, "asda");
        assert_eq!(scanned[1].snapshots.len(), 2);
        assert_eq!(scanned[1].snapshots[0].name.formatted_timestamp(), "2024-06-01_10-00-00");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scan_skips_unlistable_source_dir() {
        let dir = tempdir().unwrap();
        let bp = dir.path().join("bp");
        std::fs::create_dir_all(&bp).unwrap();
        std::fs::write(bp.join("bp_2024-06-01_10-00-00.json"), "{}").unwrap();
        // Self-referencing link: listing it fails with ELOOP
        let esso = dir.path().join("esso");
        std::os::unix::fs::symlink(&esso, &esso).unwrap();

        let scanned = scan_snapshots(dir.path()).await.unwrap();
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[0].slug, "bp");
        assert!(scan_source_dir(&esso).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_snapshot_survives_and_temp_is_removed() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path());
        let feed = record(json!({ "last_updated": 1_717_322_472, "stations": [] }));
        let name = SnapshotWriter::snapshot_name(&feed, TimestampPolicy::Auto).unwrap();
        let source_dir = dir.path().join(&name.slug);
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(source_dir.join(name.to_string()), "kept").unwrap();

        assert!(matches!(
            writer.write(&feed, TimestampPolicy::Auto).await,
            Err(SnapshotError::AlreadyExists(_))
        ));
        assert_eq!(std::fs::read_to_string(source_dir.join(name.to_string())).unwrap(), "kept");
        assert_eq!(std::fs::read_dir(&source_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_scan_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        assert!(scan_snapshots(&dir.path().join("missing")).await.unwrap().is_empty());
    }
}
