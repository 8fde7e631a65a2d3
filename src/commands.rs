//! Command handlers behind the CLI
//!
//! Each handler takes the fully resolved `AppConfig` (file values with CLI
//! overrides applied) and wires the infrastructure for one run.

pub mod crawl;
pub mod discover;
pub mod ingest;
pub mod report;

pub use crawl::run_crawl;
pub use discover::{DiscoverRequest, list_taxonomy, run_discover};
pub use ingest::{IngestOutcome, run_ingest};
pub use report::run_report;
