//! `report`: price summary over the latest stored observations, optionally
//! followed by each source's average at every stored update time

use std::collections::BTreeSet;
use std::fmt::Write as _;

use anyhow::{Context, Result};

use crate::domain::{FuelGrade, StationRow};
use crate::infrastructure::StationStore;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::station_store::{HistoricalAverage, PricePoint, PriceSummary, SourceAverage};

/// Sources shown at each end of the ranking
pub const RANKING_SIZE: usize = 5;

fn describe(point: &PricePoint) -> String {
    let place = [point.brand.as_deref(), point.address.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");
    if place.is_empty() {
        format!("{:.1}p ({})", point.price, point.source)
    } else {
        format!("{:.1}p at {} ({})", point.price, place, point.source)
    }
}

/// Plain-text report; `summary` is `None` when no station prices the grade
pub fn render_report(grade: FuelGrade, summary: Option<&PriceSummary>, averages: &[SourceAverage]) -> String {
    let mut out = String::new();
    let Some(summary) = summary else {
        let _ = writeln!(out, "No {} prices stored yet", grade);
        return out;
    };

    let _ = writeln!(out, "{} across {} stations", grade, summary.stations);
    let _ = writeln!(out, "  cheapest: {}", describe(&summary.min));
    let _ = writeln!(out, "  dearest:  {}", describe(&summary.max));
    let _ = writeln!(out, "  mean:     {:.1}p", summary.mean);

    let _ = writeln!(out, "\nCheapest sources");
    for average in averages.iter().take(RANKING_SIZE) {
        let _ = writeln!(out, "  {:<20} {:.1}p", average.source, average.average);
    }
    let _ = writeln!(out, "\nMost expensive sources");
    for average in averages.iter().rev().take(RANKING_SIZE) {
        let _ = writeln!(out, "  {:<20} {:.1}p", average.source, average.average);
    }
    out
}

/// One line on what the latest observations cover
pub fn render_coverage(grade: FuelGrade, latest: &[StationRow]) -> String {
    let sources: BTreeSet<&str> = latest.iter().map(|row| row.source.as_str()).collect();
    let priced = latest.iter().filter(|row| row.price(grade).is_some()).count();
    format!(
        "Latest observations: {} stations from {} sources, {} priced for {}\n",
        latest.len(),
        sources.len(),
        priced,
        grade
    )
}

/// Per-source average of `grade` at every update time, newest first
pub fn render_history(grade: FuelGrade, history: &[HistoricalAverage]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nPrice history ({})", grade);
    let mut shown = 0;
    for entry in history {
        let Some(price) = entry.price(grade) else {
            continue;
        };
        let when = entry
            .last_updated
            .map_or_else(|| "undated".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        let _ = writeln!(out, "  {:<16} {:<20} {:.1}p", when, entry.source, price);
        shown += 1;
    }
    if shown == 0 {
        let _ = writeln!(out, "  none");
    }
    out
}

pub async fn run_report(config: &AppConfig, grade: FuelGrade, history: bool) -> Result<String> {
    let store = StationStore::connect(&config.store.database_url)
        .await
        .with_context(|| format!("Failed to open station database {}", config.store.database_url))?;
    store.migrate().await.context("Failed to prepare station database")?;

    let summary = store.price_summary(grade).await.context("Failed to summarise prices")?;
    let averages = store.source_averages(grade).await.context("Failed to rank sources")?;
    let mut out = render_report(grade, summary.as_ref(), &averages);

    if summary.is_some() {
        let latest = store.latest_rows().await.context("Failed to read latest observations")?;
        out.push_str(&render_coverage(grade, &latest));
    }
    if history {
        let entries = store.historical_averages().await.context("Failed to read price history")?;
        out.push_str(&render_history(grade, &entries));
    }
    Ok(out)
}
