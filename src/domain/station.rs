use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::timestamp::{TimestampError, TimestampPolicy};

/// Field in a retailer feed carrying the vendor-supplied update time
pub const LAST_UPDATED_FIELD: &str = "last_updated";

/// One retailer feed response as retrieved at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecord {
    /// Display name of the retailer (registry name)
    pub source: String,
    /// When the feed was retrieved (or, on replay, when the snapshot was taken)
    pub retrieved_at: DateTime<Utc>,
    /// Raw nested JSON document
    pub payload: Value,
}

impl FeedRecord {
    pub fn new(source: impl Into<String>, payload: Value) -> Self {
        Self {
            source: source.into(),
            retrieved_at: Utc::now(),
            payload,
        }
    }

    pub fn with_retrieved_at(mut self, retrieved_at: DateTime<Utc>) -> Self {
        self.retrieved_at = retrieved_at;
        self
    }

    /// Raw `last_updated` value as published by the vendor, if any
    pub fn vendor_timestamp(&self) -> Option<&Value> {
        self.payload.get(LAST_UPDATED_FIELD)
    }

    /// Feed-level update time: vendor value when present, retrieval time otherwise
    pub fn last_updated(&self, policy: TimestampPolicy) -> Result<DateTime<Utc>, TimestampError> {
        policy.resolve(self.vendor_timestamp(), self.retrieved_at)
    }
}

/// One normalized fuel-station observation.
///
/// Every field is a required key; values are null when the source omits them.
/// The four price grades are serialized even when `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationRow {
    pub source: String,
    pub address: Option<String>,
    pub brand: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub postcode: Option<String>,
    pub site_id: Option<String>,
    pub b7: Option<f64>,
    pub sdv: Option<f64>,
    pub e5: Option<f64>,
    pub e10: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl StationRow {
    pub fn price(&self, grade: FuelGrade) -> Option<f64> {
        match grade {
            FuelGrade::B7 => self.b7,
            FuelGrade::Sdv => self.sdv,
            FuelGrade::E5 => self.e5,
            FuelGrade::E10 => self.e10,
        }
    }
}

/// Fuel grades published in the retailer feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelGrade {
    B7,
    Sdv,
    E5,
    E10,
}

impl FuelGrade {
    pub const ALL: [FuelGrade; 4] = [FuelGrade::B7, FuelGrade::Sdv, FuelGrade::E5, FuelGrade::E10];

    /// Column name in the normalized schema
    pub fn column(self) -> &'static str {
        match self {
            FuelGrade::B7 => "b7",
            FuelGrade::Sdv => "sdv",
            FuelGrade::E5 => "e5",
            FuelGrade::E10 => "e10",
        }
    }

    /// Key of this grade after flattening a feed station (`prices.B7` -> `prices_B7`)
    pub fn flattened_key(self) -> &'static str {
        match self {
            FuelGrade::B7 => "prices_B7",
            FuelGrade::Sdv => "prices_SDV",
            FuelGrade::E5 => "prices_E5",
            FuelGrade::E10 => "prices_E10",
        }
    }
}

impl fmt::Display for FuelGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for FuelGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b7" => Ok(FuelGrade::B7),
            "sdv" => Ok(FuelGrade::Sdv),
            "e5" => Ok(FuelGrade::E5),
            "e10" => Ok(FuelGrade::E10),
            other => Err(format!("unknown fuel grade '{}' (expected b7, sdv, e5 or e10)", other)),
        }
    }
}

/// All station rows produced by one ingestion run, in source order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedDataset {
    rows: Vec<StationRow>,
}

impl CombinedDataset {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<StationRow>) -> Self {
        Self { rows }
    }

    /// Append one source's rows, keeping their order
    pub fn append(&mut self, rows: Vec<StationRow>) {
        self.rows.extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[StationRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<StationRow> {
        self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &StationRow> {
        self.rows.iter()
    }

    pub fn count_for_source(&self, source: &str) -> usize {
        self.rows.iter().filter(|row| row.source == source).count()
    }
}
