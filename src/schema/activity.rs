//! Activity record definition
//!
//! Records arrive as GameBus activity JSON:
//!
//! ```json
//! {
//!   "id": 4211,
//!   "date": 1700000000000,
//!   "propertyInstances": [
//!     { "property": { "translationKey": "SCORE" }, "value": "80" }
//!   ]
//! }
//! ```

use crate::error::ComputeError;
use crate::types::DataSource;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Date format the external fetcher expects for its `start=` filter
pub const CURSOR_DATE_FORMAT: &str = "%d-%m-%Y";

/// Semantic tag of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyKey {
    Score,
    Playtime,
    GlucoseRangePercentage,
    PlaythroughData,
    EngagementData,
    ThroughHint,
    QuestionCorrect,
    #[serde(rename = "DIFFICULTY_LIKERT_3")]
    DifficultyLikert3,
}

impl PropertyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKey::Score => "SCORE",
            PropertyKey::Playtime => "PLAYTIME",
            PropertyKey::GlucoseRangePercentage => "GLUCOSE_RANGE_PERCENTAGE",
            PropertyKey::PlaythroughData => "PLAYTHROUGH_DATA",
            PropertyKey::EngagementData => "ENGAGEMENT_DATA",
            PropertyKey::ThroughHint => "THROUGH_HINT",
            PropertyKey::QuestionCorrect => "QUESTION_CORRECT",
            PropertyKey::DifficultyLikert3 => "DIFFICULTY_LIKERT_3",
        }
    }

    /// Parse a translation key; unknown keys yield `None`
    pub fn parse(translation_key: &str) -> Option<Self> {
        match translation_key {
            "SCORE" => Some(PropertyKey::Score),
            "PLAYTIME" => Some(PropertyKey::Playtime),
            "GLUCOSE_RANGE_PERCENTAGE" => Some(PropertyKey::GlucoseRangePercentage),
            "PLAYTHROUGH_DATA" => Some(PropertyKey::PlaythroughData),
            "ENGAGEMENT_DATA" => Some(PropertyKey::EngagementData),
            "THROUGH_HINT" => Some(PropertyKey::ThroughHint),
            "QUESTION_CORRECT" => Some(PropertyKey::QuestionCorrect),
            "DIFFICULTY_LIKERT_3" => Some(PropertyKey::DifficultyLikert3),
            _ => None,
        }
    }
}

/// Property descriptor attached to a value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDescriptor {
    pub translation_key: String,
}

/// One key-tagged value of an activity record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property: PropertyDescriptor,
    /// Raw value: usually a string, sometimes a JSON-encoded sub-document
    #[serde(default)]
    pub value: serde_json::Value,
}

impl PropertyValue {
    pub fn key(&self) -> Option<PropertyKey> {
        PropertyKey::parse(&self.property.translation_key)
    }
}

/// One logged unit of gameplay or quiz interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Source-assigned, monotonically increasing id
    pub id: u64,
    /// Epoch milliseconds
    #[serde(alias = "timestamp")]
    pub date: i64,
    #[serde(default)]
    pub property_instances: Vec<PropertyValue>,
}

impl ActivityRecord {
    /// First value tagged with `key`
    pub fn property(&self, key: PropertyKey) -> Option<&serde_json::Value> {
        self.property_instances
            .iter()
            .find(|instance| instance.key() == Some(key))
            .map(|instance| &instance.value)
    }

    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.date)
    }
}

/// Highest-id record of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestRecord {
    pub id: u64,
    pub date_millis: i64,
}

impl LatestRecord {
    /// Record date in the fetcher's cursor format (UTC)
    pub fn cursor_date(&self) -> Option<String> {
        DateTime::<Utc>::from_timestamp_millis(self.date_millis)
            .map(|date| date.format(CURSOR_DATE_FORMAT).to_string())
    }
}

/// Decoding and cursor helpers for activity batches
pub struct ActivityBatch;

impl ActivityBatch {
    /// Decode a JSON array of activity records.
    ///
    /// A batch that is not a well-formed record array is fatal for the cycle.
    pub fn parse(json: &str, source: DataSource) -> Result<Vec<ActivityRecord>, ComputeError> {
        let trimmed = json.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(trimmed).map_err(|e| {
            warn!(source = source.as_str(), error = %e, "malformed activity batch");
            ComputeError::MalformedBatch {
                data_source: source.as_str().to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Records strictly newer than the low-water mark (0 = no prior cursor)
    pub fn after_cursor(
        records: &[ActivityRecord],
        low_water_mark: u64,
    ) -> impl Iterator<Item = &ActivityRecord> {
        records.iter().filter(move |record| record.id > low_water_mark)
    }

    /// Highest-id record newer than the low-water mark
    pub fn latest(records: &[ActivityRecord], low_water_mark: u64) -> Option<LatestRecord> {
        Self::after_cursor(records, low_water_mark)
            .max_by_key(|record| record.id)
            .map(|record| LatestRecord {
                id: record.id,
                date_millis: record.date,
            })
    }

    /// Whether the batch holds anything past the low-water mark
    pub fn has_new_records(records: &[ActivityRecord], low_water_mark: u64) -> bool {
        Self::after_cursor(records, low_water_mark).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch_json() -> &'static str {
        r#"[
            {
                "id": 10,
                "date": 1700000000000,
                "propertyInstances": [
                    { "property": { "translationKey": "SCORE" }, "value": "80" },
                    { "property": { "translationKey": "SOMETHING_ELSE" }, "value": "x" }
                ]
            },
            {
                "id": 12,
                "date": 1700086400000,
                "propertyInstances": []
            },
            {
                "id": 11,
                "date": 1700040000000
            }
        ]"#
    }

    #[test]
    fn test_parse_batch() {
        let records = ActivityBatch::parse(sample_batch_json(), DataSource::Playthrough).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].property(PropertyKey::Score).unwrap(), "80");
        assert!(records[0].property(PropertyKey::Playtime).is_none());
        assert!(records[2].property_instances.is_empty());
    }

    #[test]
    fn test_malformed_batch() {
        let err = ActivityBatch::parse("{not json", DataSource::Trivia).unwrap_err();
        assert!(matches!(err, ComputeError::MalformedBatch { .. }));
        assert!(err.to_string().contains("trivia"));

        // An object is not a record array
        let err = ActivityBatch::parse(r#"{"id": 1}"#, DataSource::Trivia).unwrap_err();
        assert!(matches!(err, ComputeError::MalformedBatch { .. }));
    }

    #[test]
    fn test_empty_input_is_empty_batch() {
        let records = ActivityBatch::parse("  \n", DataSource::Engagement).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_cursor_filtering() {
        let records = ActivityBatch::parse(sample_batch_json(), DataSource::Playthrough).unwrap();

        assert_eq!(ActivityBatch::after_cursor(&records, 0).count(), 3);
        assert_eq!(ActivityBatch::after_cursor(&records, 10).count(), 2);
        assert!(!ActivityBatch::has_new_records(&records, 12));

        let latest = ActivityBatch::latest(&records, 0).unwrap();
        assert_eq!(latest.id, 12);
        assert_eq!(latest.cursor_date().as_deref(), Some("15-11-2023"));
        assert!(ActivityBatch::latest(&records, 12).is_none());
    }

    #[test]
    fn test_property_key_round_trip() {
        for key in [
            PropertyKey::Score,
            PropertyKey::Playtime,
            PropertyKey::GlucoseRangePercentage,
            PropertyKey::PlaythroughData,
            PropertyKey::EngagementData,
            PropertyKey::ThroughHint,
            PropertyKey::QuestionCorrect,
            PropertyKey::DifficultyLikert3,
        ] {
            assert_eq!(PropertyKey::parse(key.as_str()), Some(key));
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
        assert_eq!(PropertyKey::parse("UNKNOWN"), None);
    }
}
