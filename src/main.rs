use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use petro_ingest_lib::commands::{self, DiscoverRequest};
use petro_ingest_lib::domain::{FuelGrade, Provenance};
use petro_ingest_lib::infrastructure::config::{AppConfig, ConfigManager, PageRenderer};
use petro_ingest_lib::infrastructure::logging::{init_logging_with_config, log_system_info};

#[derive(Parser)]
#[command(name = "petro-ingest")]
#[command(about = "UK fuel price feed ingestion and resumable grocery product crawling")]
#[command(version)]
struct Cli {
    /// Configuration file path (defaults to the per-user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every retailer feed, snapshot it and store the stations
    Ingest {
        /// Rebuild the dataset from stored snapshots instead of fetching
        #[arg(long)]
        replay: bool,

        /// Snapshot root directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Station database URL
        #[arg(long)]
        database: Option<String>,

        /// Do not write rows to the station database
        #[arg(long)]
        no_store: bool,
    },

    /// Scrape product detail pages, resuming from the progress file
    Crawl {
        /// JSON item list produced by `discover`
        #[arg(long)]
        items: Option<PathBuf>,

        /// Output log (one JSON record per line)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Progress cursor file
        #[arg(long)]
        progress: Option<PathBuf>,

        /// Concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Fetch server-rendered HTML instead of rendering in headless Chromium
        #[arg(long)]
        http: bool,
    },

    /// Collect product links from every page of an aisle
    Discover {
        /// First listing page of the aisle
        #[arg(long)]
        aisle_url: String,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        department: Option<String>,

        #[arg(long)]
        aisle: Option<String>,

        /// Item list to create or extend
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// List the navigation links of a category or department page
    Taxonomy {
        url: String,
    },

    /// Summarise the latest stored prices of one grade
    Report {
        /// b7, sdv, e5 or e10
        #[arg(short, long, default_value = "e10")]
        fuel: FuelGrade,

        /// Station database URL
        #[arg(long)]
        database: Option<String>,

        /// Append each source's average at every stored update time
        #[arg(long)]
        history: bool,
    },
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    match cli.verbose {
        0 => {}
        1 => config.logging.level = "debug".to_string(),
        _ => config.logging.level = "trace".to_string(),
    }

    match &cli.command {
        Commands::Ingest {
            replay,
            snapshot_dir,
            database,
            no_store,
        } => {
            config.ingest.replay |= *replay;
            if let Some(dir) = snapshot_dir {
                config.ingest.snapshot_dir.clone_from(dir);
            }
            if let Some(url) = database {
                config.store.database_url.clone_from(url);
            }
            if *no_store {
                config.store.enabled = false;
            }
        }
        Commands::Crawl {
            items,
            output,
            progress,
            workers,
            http,
        } => {
            if let Some(path) = items {
                config.crawl.items_file.clone_from(path);
            }
            if let Some(path) = output {
                config.crawl.output_file.clone_from(path);
            }
            if let Some(path) = progress {
                config.crawl.progress_file.clone_from(path);
            }
            if let Some(workers) = workers {
                config.crawl.workers = *workers;
            }
            if *http {
                config.crawl.renderer = PageRenderer::Http;
            }
        }
        Commands::Report { database, .. } => {
            if let Some(url) = database {
                config.store.database_url.clone_from(url);
            }
        }
        Commands::Discover { .. } | Commands::Taxonomy { .. } => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    let mut config = manager.load_config().await?;
    apply_overrides(&mut config, &cli);

    let _guard = init_logging_with_config(&config.logging).context("Failed to initialize logging")?;
    log_system_info();
    info!("Configuration: {}", manager.config_path().display());

    match cli.command {
        Commands::Ingest { .. } => {
            let outcome = commands::run_ingest(&config).await?;
            let failed = outcome.report.failed_sources().count();
            println!(
                "{} rows from {} sources ({} failed){}",
                outcome.report.dataset.len(),
                outcome.report.outcomes.len() - failed,
                failed,
                outcome
                    .stored
                    .map(|n| format!(", {} new rows stored", n))
                    .unwrap_or_default()
            );
        }
        Commands::Crawl { .. } => {
            let summary = commands::run_crawl(&config).await?;
            println!(
                "{} succeeded, {} failed, {} already done; cursor at {}",
                summary.succeeded, summary.failed, summary.skipped, summary.cursor
            );
        }
        Commands::Discover {
            aisle_url,
            category,
            department,
            aisle,
            out,
        } => {
            let request = DiscoverRequest {
                aisle_url,
                provenance: Provenance {
                    category,
                    department,
                    aisle,
                },
                out: out.unwrap_or_else(|| config.crawl.items_file.clone()),
            };
            let added = commands::run_discover(&config, &request).await?;
            println!("{} new items written to {}", added, request.out.display());
        }
        Commands::Taxonomy { url } => {
            let links = commands::list_taxonomy(&config, &url).await?;
            println!("{}", serde_json::to_string_pretty(&links)?);
        }
        Commands::Report { fuel, history, .. } => {
            print!("{}", commands::run_report(&config, fuel, history).await?);
        }
    }

    Ok(())
}
