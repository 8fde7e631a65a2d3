//! `ingest`: fetch (or replay) every retailer feed and store the rows

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::{AggregationReport, Aggregator, IngestMode, SourceStatus};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::{HttpClientConfig, HttpFeedFetcher, SnapshotWriter, SourceRegistry, StationStore};

/// Result of one ingestion run
#[derive(Debug)]
pub struct IngestOutcome {
    pub report: AggregationReport,
    /// Rows newly written to the station database; `None` when storage is off
    pub stored: Option<u64>,
}

pub async fn run_ingest(config: &AppConfig) -> Result<IngestOutcome> {
    let registry = SourceRegistry::from_config(&config.ingest.sources);
    let http_config = HttpClientConfig::new(config.ingest.user_agent.clone(), config.ingest.request_timeout_seconds);
    let fetcher = HttpFeedFetcher::new(&http_config).context("Failed to create feed fetcher")?;
    let writer = SnapshotWriter::new(&config.ingest.snapshot_dir);

    let mode = if config.ingest.replay {
        IngestMode::Replay
    } else {
        IngestMode::Live
    };

    let aggregator = Aggregator::new(registry, Arc::new(fetcher), writer);
    let report = aggregator
        .aggregate(mode)
        .await
        .context("Failed to read snapshot directory")?;

    for outcome in &report.outcomes {
        match outcome.status {
            SourceStatus::Ingested => info!("  {} → {} rows", outcome.source, outcome.rows),
            SourceStatus::SnapshotSkipped => {
                warn!("  {} → {} rows (snapshot not written)", outcome.source, outcome.rows);
            }
            SourceStatus::FetchFailed => warn!("  {} → fetch failed", outcome.source),
        }
    }

    let stored = if config.store.enabled {
        Some(store_dataset(config, &report).await?)
    } else {
        info!("Station database disabled, rows not stored");
        None
    };

    Ok(IngestOutcome { report, stored })
}

async fn store_dataset(config: &AppConfig, report: &AggregationReport) -> Result<u64> {
    if report.dataset.is_empty() {
        return Ok(0);
    }

    let store = StationStore::connect(&config.store.database_url)
        .await
        .with_context(|| format!("Failed to open station database {}", config.store.database_url))?;
    store.migrate().await.context("Failed to prepare station database")?;

    store
        .insert_dataset(&report.dataset)
        .await
        .context("Failed to store station rows")
}
