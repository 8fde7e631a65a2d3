//! Multi-source aggregation
//!
//! Live mode walks the registry in order: fetch, snapshot, normalize. Replay
//! mode rebuilds the dataset from every stored snapshot instead. Either way a
//! failing source only costs its own rows.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::normalizer::normalize;
use crate::domain::{CombinedDataset, FeedRecord, TimestampPolicy};
use crate::infrastructure::feed_fetcher::FeedSource;
use crate::infrastructure::snapshot_writer::{SnapshotError, SnapshotWriter, StoredSnapshot, scan_snapshots};
use crate::infrastructure::source_registry::SourceRegistry;

/// Where station data comes from in this run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Fetch every feed now and snapshot it
    Live,
    /// Re-read previously stored snapshots
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Fetched (live) or loaded (replay) and normalized
    Ingested,
    /// Live fetch failed; no rows
    FetchFailed,
    /// Rows kept but the raw snapshot was not written
    SnapshotSkipped,
}

/// What one source contributed to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOutcome {
    pub source: String,
    pub status: SourceStatus,
    pub rows: usize,
    /// Snapshot files read (replay) or written (live)
    pub snapshots: usize,
}

#[derive(Debug, Clone)]
pub struct AggregationReport {
    pub run_id: Uuid,
    pub mode: IngestMode,
    pub dataset: CombinedDataset,
    pub outcomes: Vec<SourceOutcome>,
}

impl AggregationReport {
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.outcomes.iter().filter(|o| o.status == SourceStatus::FetchFailed)
    }
}

pub struct Aggregator {
    registry: SourceRegistry,
    fetcher: Arc<dyn FeedSource>,
    writer: SnapshotWriter,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, fetcher: Arc<dyn FeedSource>, writer: SnapshotWriter) -> Self {
        Self {
            registry,
            fetcher,
            writer,
        }
    }

    pub async fn aggregate(&self, mode: IngestMode) -> Result<AggregationReport, SnapshotError> {
        let run_id = Uuid::new_v4();
        info!("🚀 Ingestion run {} started ({:?}, {} sources)", run_id, mode, self.registry.len());

        let (dataset, outcomes) = match mode {
            IngestMode::Live => self.aggregate_live().await,
            IngestMode::Replay => self.aggregate_replay().await?,
        };

        if dataset.is_empty() {
            warn!("⚠️ Ingestion run {} produced no station rows", run_id);
        } else {
            info!(
                "✅ Ingestion run {} finished: {} rows from {} sources",
                run_id,
                dataset.len(),
                outcomes.iter().filter(|o| o.rows > 0).count()
            );
        }

        Ok(AggregationReport {
            run_id,
            mode,
            dataset,
            outcomes,
        })
    }

    async fn aggregate_live(&self) -> (CombinedDataset, Vec<SourceOutcome>) {
        let mut dataset = CombinedDataset::empty();
        let mut outcomes = Vec::with_capacity(self.registry.len());

        for entry in self.registry.entries() {
            let Some(record) = self.fetcher.fetch(entry).await else {
                outcomes.push(SourceOutcome {
                    source: entry.name.clone(),
                    status: SourceStatus::FetchFailed,
                    rows: 0,
                    snapshots: 0,
                });
                continue;
            };

            let status = match self.writer.write(&record, entry.timestamp_policy).await {
                Ok(_) => SourceStatus::Ingested,
                Err(SnapshotError::AlreadyExists(path)) => {
                    warn!("⚠️ {} snapshot already stored, keeping {}", entry.name, path.display());
                    SourceStatus::SnapshotSkipped
                }
                Err(e) => {
                    error!("❌ Failed to save {} snapshot: {}", entry.name, e);
                    SourceStatus::SnapshotSkipped
                }
            };

            let rows = normalize(&record, entry.timestamp_policy);
            info!("📊 {}: {} stations", entry.name, rows.len());
            outcomes.push(SourceOutcome {
                source: entry.name.clone(),
                status,
                rows: rows.len(),
                snapshots: usize::from(status == SourceStatus::Ingested),
            });
            dataset.append(rows);
        }

        (dataset, outcomes)
    }

    async fn aggregate_replay(&self) -> Result<(CombinedDataset, Vec<SourceOutcome>), SnapshotError> {
        let mut dataset = CombinedDataset::empty();
        let mut outcomes = Vec::new();

        for source_dir in scan_snapshots(self.writer.root()).await? {
            let (source, policy) = match self.registry.find_by_slug(&source_dir.slug) {
                Some(entry) => (entry.name.clone(), entry.timestamp_policy),
                None => (source_dir.slug.clone(), TimestampPolicy::Auto),
            };

            let mut rows_for_source = 0;
            let mut loaded = 0;
            for snapshot in &source_dir.snapshots {
                let Some(record) = load_snapshot(&source, snapshot).await else {
                    continue;
                };
                let rows = normalize(&record, policy);
                rows_for_source += rows.len();
                loaded += 1;
                dataset.append(rows);
            }

            info!("📂 {}: {} rows from {} snapshots", source, rows_for_source, loaded);
            outcomes.push(SourceOutcome {
                source,
                status: SourceStatus::Ingested,
                rows: rows_for_source,
                snapshots: loaded,
            });
        }

        Ok((dataset, outcomes))
    }
}

/// Read one stored snapshot back into a feed record; unreadable files are skipped
async fn load_snapshot(source: &str, snapshot: &StoredSnapshot) -> Option<FeedRecord> {
    let bytes = match tokio::fs::read(&snapshot.path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("⚠️ Cannot read snapshot {}: {}", snapshot.path.display(), e);
            return None;
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(payload) => Some(FeedRecord::new(source, payload).with_retrieved_at(snapshot.name.timestamp_utc())),
        Err(e) => {
            warn!("⚠️ Snapshot {} is not valid JSON: {}", display_name(&snapshot.path), e);
            None
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::source_registry::SourceEntry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct StubFeeds(HashMap<String, Value>);

    #[async_trait]
    impl FeedSource for StubFeeds {
        async fn fetch(&self, entry: &SourceEntry) -> Option<FeedRecord> {
            self.0
                .get(&entry.name)
                .map(|payload| FeedRecord::new(entry.name.clone(), payload.clone()))
        }
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::new(vec![
            SourceEntry::new("Alpha Fuels", "http://alpha"),
            SourceEntry::new("Beta", "http://beta"),
        ])
    }

    #[tokio::test]
    async fn test_live_keeps_rows_when_snapshot_timestamp_is_bad() {
        let dir = tempdir().unwrap();
        let mut feeds = HashMap::new();
        feeds.insert(
            "Alpha Fuels".to_string(),
            json!({ "last_updated": "not a date", "stations": [{ "site_id": "a1" }] }),
        );
        let aggregator = Aggregator::new(registry(), Arc::new(StubFeeds(feeds)), SnapshotWriter::new(dir.path()));

        let report = aggregator.aggregate(IngestMode::Live).await.unwrap();

        assert_eq!(report.dataset.len(), 1);
        assert_eq!(report.outcomes[0].status, SourceStatus::SnapshotSkipped);
        assert_eq!(report.outcomes[1].status, SourceStatus::FetchFailed);
        assert_eq!(report.failed_sources().count(), 1);
        assert!(!dir.path().join("alpha-fuels").exists());
    }

    #[tokio::test]
    async fn test_replay_maps_slugs_and_skips_broken_files() {
        let dir = tempdir().unwrap();
        let alpha = dir.path().join("alpha-fuels");
        let stray = dir.path().join("gamma");
        std::fs::create_dir_all(&alpha).unwrap();
        std::fs::create_dir_all(&stray).unwrap();
        std::fs::write(
            alpha.join("alpha-fuels_2024-06-01_10-00-00.json"),
            json!({ "stations": [{ "site_id": "a1" }, { "site_id": "a2" }] }).to_string(),
        )
        .unwrap();
        std::fs::write(alpha.join("alpha-fuels_2024-06-02_10-00-00.json"), "{ truncated").unwrap();
        std::fs::write(
            stray.join("gamma_2024-06-01_10-00-00.json"),
            json!({ "stations": [{ "site_id": "g1" }] }).to_string(),
        )
        .unwrap();

        let aggregator = Aggregator::new(registry(), Arc::new(StubFeeds(HashMap::new())), SnapshotWriter::new(dir.path()));
        let report = aggregator.aggregate(IngestMode::Replay).await.unwrap();

        assert_eq!(report.dataset.len(), 3);
        assert_eq!(report.dataset.count_for_source("Alpha Fuels"), 2);
        assert_eq!(report.dataset.count_for_source("gamma"), 1);
        assert_eq!(report.outcomes[0].snapshots, 1);

        // Missing vendor timestamp falls back to the snapshot's own time
        let first = &report.dataset.rows()[0];
        assert_eq!(first.last_updated.unwrap().to_rfc3339(), "2024-06-01T10:00:00+00:00");
    }

    #[tokio::test]
    async fn test_replay_without_snapshots_is_empty() {
        let dir = tempdir().unwrap();
        let aggregator = Aggregator::new(
            registry(),
            Arc::new(StubFeeds(HashMap::new())),
            SnapshotWriter::new(dir.path().join("nothing-here")),
        );

        let report = aggregator.aggregate(IngestMode::Replay).await.unwrap();
        assert!(report.dataset.is_empty());
        assert!(report.outcomes.is_empty());
    }
}
