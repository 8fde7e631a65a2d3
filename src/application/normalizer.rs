//! Feed → station row normalization
//!
//! Station objects are flattened with `_` (`location.latitude` becomes
//! `location_latitude`, `prices.E10` becomes `prices_E10`) and mapped onto the
//! fixed row schema. The feed-level `last_updated` is stamped on every row;
//! per-station timestamps are ignored.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::domain::{FeedRecord, FuelGrade, StationRow, TimestampPolicy};

/// Field holding the station array in every retailer feed
pub const STATION_LIST_FIELD: &str = "stations";

/// Separator used when flattening nested station objects
pub const FLATTEN_SEPARATOR: &str = "_";

/// Flatten one station object; all four price keys exist afterwards
pub fn flatten_station(station: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into(station, None, &mut flat);

    for grade in FuelGrade::ALL {
        flat.entry(grade.flattened_key()).or_insert(Value::Null);
    }
    flat
}

fn flatten_into(object: &Map<String, Value>, prefix: Option<&str>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let flat_key = match prefix {
            Some(prefix) => format!("{prefix}{FLATTEN_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(nested) => flatten_into(nested, Some(&flat_key), out),
            other => {
                out.insert(flat_key, other.clone());
            }
        }
    }
}

/// Numbers, or strings holding a number
fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Non-empty strings, or numbers rendered as text (some feeds publish numeric site ids)
fn as_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn row_from_flat(source: &str, flat: &Map<String, Value>, last_updated: Option<chrono::DateTime<chrono::Utc>>) -> StationRow {
    let price = |grade: FuelGrade| as_f64(flat.get(grade.flattened_key()));

    StationRow {
        source: source.to_string(),
        address: as_text(flat.get("address")),
        brand: as_text(flat.get("brand")),
        latitude: as_f64(flat.get("location_latitude")),
        longitude: as_f64(flat.get("location_longitude")),
        postcode: as_text(flat.get("postcode")),
        site_id: as_text(flat.get("site_id")),
        b7: price(FuelGrade::B7),
        sdv: price(FuelGrade::Sdv),
        e5: price(FuelGrade::E5),
        e10: price(FuelGrade::E10),
        last_updated,
    }
}

/// Normalize one feed into station rows.
///
/// A missing or non-array station list yields no rows; a bad feed timestamp
/// yields rows with `last_updated = None`. Neither is an error.
pub fn normalize(record: &FeedRecord, policy: TimestampPolicy) -> Vec<StationRow> {
    let Some(stations) = record.payload.get(STATION_LIST_FIELD) else {
        warn!("⚠️ No '{}' field in {} feed", STATION_LIST_FIELD, record.source);
        return Vec::new();
    };
    let Some(stations) = stations.as_array() else {
        warn!("⚠️ '{}' field in {} feed is not a list", STATION_LIST_FIELD, record.source);
        return Vec::new();
    };

    let last_updated = match record.last_updated(policy) {
        Ok(timestamp) => Some(timestamp),
        Err(e) => {
            warn!("⚠️ {} feed timestamp unusable, rows left undated: {}", record.source, e);
            None
        }
    };

    let mut rows = Vec::with_capacity(stations.len());
    for (index, station) in stations.iter().enumerate() {
        let Some(object) = station.as_object() else {
            warn!("⚠️ Skipping non-object station #{} in {} feed", index, record.source);
            continue;
        };
        rows.push(row_from_flat(&record.source, &flatten_station(object), last_updated));
    }

    debug!("Normalized {} stations from {}", rows.len(), record.source);
    rows
}
