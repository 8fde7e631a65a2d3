//! Station price database
//!
//! SQLite table of every ingested `StationRow`, plus the read queries the
//! price report uses: latest prices per source, historical averages and
//! min/max/mean statistics for one fuel grade.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{FromRow, Row};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{CombinedDataset, FuelGrade, StationRow};
use crate::infrastructure::config::uk_fuel;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot prepare database file {path}: {message}")]
    Setup { path: String, message: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Per-source average of every grade at one update time
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct HistoricalAverage {
    pub source: String,
    pub last_updated: Option<DateTime<Utc>>,
    pub b7: Option<f64>,
    pub sdv: Option<f64>,
    pub e5: Option<f64>,
    pub e10: Option<f64>,
}

impl HistoricalAverage {
    pub fn price(&self, grade: FuelGrade) -> Option<f64> {
        match grade {
            FuelGrade::B7 => self.b7,
            FuelGrade::Sdv => self.sdv,
            FuelGrade::E5 => self.e5,
            FuelGrade::E10 => self.e10,
        }
    }
}

/// Average latest price of one grade for one source
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct SourceAverage {
    pub source: String,
    pub average: f64,
}

/// Station holding an extreme price
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub source: String,
    pub brand: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Key statistics over the latest prices of one grade
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub grade: FuelGrade,
    pub min: PricePoint,
    pub max: PricePoint,
    pub mean: f64,
    pub stations: i64,
}

/// Rows whose `last_updated` is the newest of their source, outside Gibraltar.
/// A source that never published a usable timestamp keeps its undated rows.
const LATEST_ROWS: &str = r#"
    SELECT s.*
    FROM stations s
    JOIN (SELECT source, MAX(last_updated) AS last_updated FROM stations GROUP BY source) latest
        ON s.source = latest.source AND s.last_updated IS latest.last_updated
    WHERE s.postcode IS NULL OR s.postcode != ?
"#;

pub struct StationStore {
    pool: SqlitePool,
}

impl StationStore {
    /// Open (creating the file and its directory if needed) a SQLite database
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let db_path = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .unwrap_or(database_url);

        let setup_error = |e: std::io::Error| StoreError::Setup {
            path: db_path.to_string(),
            message: e.to_string(),
        };

        if db_path != ":memory:" && !Path::new(db_path).exists() {
            if let Some(parent) = Path::new(db_path).parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(setup_error)?;
            }
            std::fs::File::create(db_path).map_err(setup_error)?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if db_path == ":memory:" { 1 } else { 5 })
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        let create_stations_sql = r#"
            CREATE TABLE IF NOT EXISTS stations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                address TEXT,
                brand TEXT,
                latitude REAL,
                longitude REAL,
                postcode TEXT,
                site_id TEXT,
                b7 REAL,
                sdv REAL,
                e5 REAL,
                e10 REAL,
                last_updated TEXT,
                ingested_at TEXT NOT NULL
            )
        "#;

        // Row identity; missing site ids and timestamps compare equal
        let create_indexes_sql = [
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_stations_identity \
             ON stations (source, COALESCE(site_id, ''), COALESCE(last_updated, ''))",
            "CREATE INDEX IF NOT EXISTS idx_stations_source_updated ON stations (source, last_updated)",
            "CREATE INDEX IF NOT EXISTS idx_stations_postcode ON stations (postcode)",
        ];

        sqlx::query(create_stations_sql).execute(&self.pool).await?;
        for sql in create_indexes_sql {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        Ok(())
    }

    /// Insert every row in one transaction; rows already stored
    /// (same source, site and update time, missing values included) are
    /// ignored. Returns rows written.
    pub async fn insert_dataset(&self, dataset: &CombinedDataset) -> Result<u64, StoreError> {
        let ingested_at = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for row in dataset.iter() {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO stations
                    (source, address, brand, latitude, longitude, postcode, site_id, b7, sdv, e5, e10, last_updated, ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.source)
            .bind(&row.address)
            .bind(&row.brand)
            .bind(row.latitude)
            .bind(row.longitude)
            .bind(&row.postcode)
            .bind(&row.site_id)
            .bind(row.b7)
            .bind(row.sdv)
            .bind(row.e5)
            .bind(row.e10)
            .bind(row.last_updated)
            .bind(ingested_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected();
        }

        tx.commit().await?;
        info!("🗄️ Stored {} of {} station rows", written, dataset.len());
        Ok(written)
    }

    fn station_from_row(row: &SqliteRow) -> Result<StationRow, sqlx::Error> {
        Ok(StationRow {
            source: row.try_get("source")?,
            address: row.try_get("address")?,
            brand: row.try_get("brand")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            postcode: row.try_get("postcode")?,
            site_id: row.try_get("site_id")?,
            b7: row.try_get("b7")?,
            sdv: row.try_get("sdv")?,
            e5: row.try_get("e5")?,
            e10: row.try_get("e10")?,
            last_updated: row.try_get("last_updated")?,
        })
    }

    /// Latest observation of every station, per source
    pub async fn latest_rows(&self) -> Result<Vec<StationRow>, StoreError> {
        let sql = format!("{} ORDER BY s.source, s.id", LATEST_ROWS);
        let rows = sqlx::query(&sql)
            .bind(uk_fuel::EXCLUDED_POSTCODE)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(Self::station_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Average of each grade per (source, update time), newest first
    pub async fn historical_averages(&self) -> Result<Vec<HistoricalAverage>, StoreError> {
        let rows = sqlx::query_as::<_, HistoricalAverage>(
            r#"
            SELECT source, last_updated, AVG(b7) AS b7, AVG(sdv) AS sdv, AVG(e5) AS e5, AVG(e10) AS e10
            FROM stations
            GROUP BY source, last_updated
            ORDER BY last_updated DESC, source
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Mean latest price of a grade per source, cheapest first
    pub async fn source_averages(&self, grade: FuelGrade) -> Result<Vec<SourceAverage>, StoreError> {
        let column = grade.column();
        let sql = format!(
            "SELECT source, AVG({column}) AS average FROM ({LATEST_ROWS}) WHERE {column} IS NOT NULL \
             GROUP BY source ORDER BY average ASC, source"
        );
        let rows = sqlx::query_as::<_, SourceAverage>(&sql)
            .bind(uk_fuel::EXCLUDED_POSTCODE)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    async fn extreme(&self, grade: FuelGrade, order: &str) -> Result<Option<PricePoint>, StoreError> {
        let column = grade.column();
        let sql = format!(
            "SELECT {column} AS price, source, brand, address, latitude, longitude FROM ({LATEST_ROWS}) \
             WHERE {column} IS NOT NULL ORDER BY {column} {order}, source LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(uk_fuel::EXCLUDED_POSTCODE)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| -> Result<PricePoint, StoreError> {
            Ok(PricePoint {
                price: row.try_get("price")?,
                source: row.try_get("source")?,
                brand: row.try_get("brand")?,
                address: row.try_get("address")?,
                latitude: row.try_get("latitude")?,
                longitude: row.try_get("longitude")?,
            })
        })
        .transpose()
    }

    /// Min, max and mean of a grade over the latest rows; `None` when no station prices it
    pub async fn price_summary(&self, grade: FuelGrade) -> Result<Option<PriceSummary>, StoreError> {
        let column = grade.column();
        let sql = format!(
            "SELECT AVG({column}) AS mean, COUNT({column}) AS stations FROM ({LATEST_ROWS}) WHERE {column} IS NOT NULL"
        );
        let row = sqlx::query(&sql)
            .bind(uk_fuel::EXCLUDED_POSTCODE)
            .fetch_one(&self.pool)
            .await?;

        let stations: i64 = row.try_get("stations")?;
        let mean: Option<f64> = row.try_get("mean")?;
        debug!("{} priced at {} latest stations", grade, stations);

        let (Some(mean), Some(min), Some(max)) = (
            mean,
            self.extreme(grade, "ASC").await?,
            self.extreme(grade, "DESC").await?,
        ) else {
            return Ok(None);
        };

        Ok(Some(PriceSummary {
            grade,
            min,
            max,
            mean,
            stations,
        }))
    }
}
