//! Source adapters
//!
//! This module provides adapters that read activity records of one data
//! source and map their properties onto typed per-session metrics. Adapters
//! never fail on a single field: a property that is absent or does not decode
//! becomes a missing sentinel and an entry in the [`MissingFieldReport`].

mod engagement;
mod playthrough;
mod trivia;

pub use engagement::EngagementAdapter;
pub use playthrough::PlaythroughAdapter;
pub use trivia::TriviaAdapter;

use crate::schema::{ActivityBatch, ActivityRecord, LatestRecord, PropertyKey};
use crate::types::DataSource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Why a field contributed a missing sentinel
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MissingReason {
    /// The record carries no property with this key
    Absent,
    /// The property exists but its value could not be decoded or coerced
    Undecodable(String),
}

/// A single field that could not be read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingField {
    pub source: DataSource,
    pub record_id: u64,
    pub field: PropertyKey,
    pub reason: MissingReason,
}

/// Every field that fell back to a missing sentinel during extraction
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MissingFieldReport {
    entries: Vec<MissingField>,
}

impl MissingFieldReport {
    pub fn record(
        &mut self,
        source: DataSource,
        record_id: u64,
        field: PropertyKey,
        reason: MissingReason,
    ) {
        debug!(
            source = source.as_str(),
            record_id,
            field = field.as_str(),
            reason = ?reason,
            "field fell back to missing"
        );
        self.entries.push(MissingField {
            source,
            record_id,
            field,
            reason,
        });
    }

    pub fn entries(&self) -> &[MissingField] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose value was present but undecodable
    pub fn undecodable(&self) -> impl Iterator<Item = &MissingField> {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.reason, MissingReason::Undecodable(_)))
    }

    pub fn absorb(&mut self, other: MissingFieldReport) {
        self.entries.extend(other.entries);
    }
}

/// Result of running an adapter over one batch
#[derive(Debug, Clone, Default)]
pub struct Extraction<M> {
    pub metrics: M,
    pub report: MissingFieldReport,
    /// Records past the low-water mark that were read
    pub records_read: usize,
    /// Newest record read, if any
    pub latest: Option<LatestRecord>,
}

/// Trait for data source adapters
pub trait SourceAdapter {
    /// Metrics accumulated over a batch
    type Metrics: Default;

    fn source(&self) -> DataSource;

    /// Read one record into the accumulated metrics
    fn extract_record(
        &self,
        record: &ActivityRecord,
        metrics: &mut Self::Metrics,
        report: &mut MissingFieldReport,
    );

    /// Read every record with `id > low_water_mark`
    fn extract(&self, records: &[ActivityRecord], low_water_mark: u64) -> Extraction<Self::Metrics> {
        let mut metrics = Self::Metrics::default();
        let mut report = MissingFieldReport::default();
        let mut records_read = 0;

        for record in ActivityBatch::after_cursor(records, low_water_mark) {
            self.extract_record(record, &mut metrics, &mut report);
            records_read += 1;
        }

        debug!(
            source = self.source().as_str(),
            records_read,
            missing_fields = report.len(),
            "extracted batch"
        );

        Extraction {
            metrics,
            report,
            records_read,
            latest: ActivityBatch::latest(records, low_water_mark),
        }
    }
}

/// Read `key` from `record` through `coerce`, reporting failures
pub(crate) fn read_property<T>(
    record: &ActivityRecord,
    source: DataSource,
    key: PropertyKey,
    report: &mut MissingFieldReport,
    coerce: impl FnOnce(&Value) -> Result<T, String>,
) -> Option<T> {
    let Some(value) = record.property(key) else {
        report.record(source, record.id, key, MissingReason::Absent);
        return None;
    };
    match coerce(value) {
        Ok(parsed) => Some(parsed),
        Err(message) => {
            report.record(source, record.id, key, MissingReason::Undecodable(message));
            None
        }
    }
}

/// Integer coercion: numeric strings and integral numbers
pub(crate) fn coerce_int(value: &Value) -> Result<i64, String> {
    match value {
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("'{text}' is not an integer: {e}")),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(|| format!("{number} is not an integer")),
        other => Err(format!("expected integer, found {other}")),
    }
}

/// Boolean coercion: `"true"`/`"false"` strings and JSON booleans
pub(crate) fn coerce_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(text) => match text.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(format!("'{other}' is not a boolean")),
        },
        other => Err(format!("expected boolean, found {other}")),
    }
}

/// Decode a sub-document that is either JSON encoded in a string or inline
pub(crate) fn decode_nested<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    match value {
        Value::String(text) => serde_json::from_str(text).map_err(|e| e.to_string()),
        other => serde_json::from_value(other.clone()).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::schema::ActivityRecord;
    use serde_json::{json, Value};

    /// Build a record from `(translation key, value)` pairs
    pub fn make_record(id: u64, properties: &[(&str, Value)]) -> ActivityRecord {
        let instances: Vec<Value> = properties
            .iter()
            .map(|(key, value)| json!({ "property": { "translationKey": key }, "value": value }))
            .collect();
        serde_json::from_value(json!({
            "id": id,
            "date": 1_700_000_000_000_i64 + id as i64 * 60_000,
            "propertyInstances": instances,
        }))
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_int(&json!("80")), Ok(80));
        assert_eq!(coerce_int(&json!(" 42 ")), Ok(42));
        assert_eq!(coerce_int(&json!(600)), Ok(600));
        assert_eq!(coerce_int(&json!(3.0)), Ok(3));
        assert!(coerce_int(&json!("80.5")).is_err());
        assert!(coerce_int(&json!(2.5)).is_err());
        assert!(coerce_int(&json!(null)).is_err());
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(coerce_bool(&json!("true")), Ok(true));
        assert_eq!(coerce_bool(&json!(false)), Ok(false));
        assert!(coerce_bool(&json!("yes")).is_err());
    }

    #[test]
    fn test_decode_nested_string_and_inline() {
        #[derive(serde::Deserialize)]
        struct Doc {
            n: u32,
        }

        let from_string: Doc = decode_nested(&json!("{\"n\": 3}")).unwrap();
        assert_eq!(from_string.n, 3);
        let inline: Doc = decode_nested(&json!({ "n": 4 })).unwrap();
        assert_eq!(inline.n, 4);
        assert!(decode_nested::<Doc>(&json!("{broken")).is_err());
    }

    #[test]
    fn test_read_property_reports_reasons() {
        let record = test_support::make_record(7, &[("SCORE", json!("abc"))]);
        let mut report = MissingFieldReport::default();

        let score = read_property(
            &record,
            DataSource::Playthrough,
            PropertyKey::Score,
            &mut report,
            coerce_int,
        );
        let playtime = read_property(
            &record,
            DataSource::Playthrough,
            PropertyKey::Playtime,
            &mut report,
            coerce_int,
        );

        assert_eq!(score, None);
        assert_eq!(playtime, None);
        assert_eq!(report.len(), 2);
        assert_eq!(report.entries()[1].reason, MissingReason::Absent);
        assert_eq!(report.undecodable().count(), 1);
        assert_eq!(report.entries()[0].record_id, 7);
    }
}
