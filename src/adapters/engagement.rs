//! SugarVita engagement log adapter
//!
//! `ENGAGEMENT_DATA` holds a document whose gameplay entries are themselves
//! JSON strings:
//!
//! ```json
//! { "GameplayData": [ { "Values": ["{\"aborted\":false,\"playerNr\":1,\"turns\":[...]}"] } ] }
//! ```
//!
//! One engagement record is one session. Every non-aborted gameplay entry of
//! the tracked player contributes its turns to that session.

use crate::schema::{ActivityRecord, PropertyKey};
use crate::types::{DataSource, GlucoseReading, SessionMetrics};
use serde::Deserialize;
use tracing::debug;

use super::{decode_nested, read_property, MissingFieldReport, MissingReason, SourceAdapter};

#[derive(Debug, Deserialize)]
struct EngagementData {
    #[serde(rename = "GameplayData", default)]
    gameplay_data: Option<Vec<GameplayEntry>>,
}

#[derive(Debug, Deserialize)]
struct GameplayEntry {
    #[serde(rename = "Values", default)]
    values: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Gameplay {
    aborted: bool,
    #[serde(default)]
    player_nr: Option<u32>,
    #[serde(default)]
    turns: Vec<Turn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Turn {
    #[serde(default)]
    is_hospitalised: bool,
    glucose_value_start: f64,
    glucose_value_end: f64,
    minutes_start: f64,
    minutes_end: f64,
}

impl Turn {
    fn start(&self) -> GlucoseReading {
        GlucoseReading::new(self.glucose_value_start, self.minutes_start)
    }

    fn end(&self) -> GlucoseReading {
        GlucoseReading::new(self.glucose_value_end, self.minutes_end)
    }
}

/// `0.0` glucose or minute `0` marks a turn end with no reading
fn is_no_reading(reading: &GlucoseReading) -> bool {
    reading.glucose == 0.0 || reading.minute == 0.0
}

/// Accumulates one session from the turns of its gameplay entries
#[derive(Debug, Default)]
struct SessionBuilder {
    series: Vec<GlucoseReading>,
    hospital_trips: u32,
    turns: usize,
}

impl SessionBuilder {
    fn push_turn(&mut self, turn: &Turn) {
        if turn.is_hospitalised {
            self.hospital_trips += 1;
        }
        if self.series.is_empty() {
            self.series.push(turn.start());
            let end = turn.end();
            if !is_no_reading(&end) {
                self.series.push(end);
            }
        } else {
            self.series.push(turn.end());
        }
        self.turns += 1;
    }

    fn finish(mut self) -> Option<(u32, Vec<GlucoseReading>)> {
        if self.turns == 0 {
            return None;
        }
        if self.series.len() > 1 && self.series.last().is_some_and(is_no_reading) {
            self.series.pop();
        }
        Some((self.hospital_trips, self.series))
    }
}

/// Engagement log adapter
pub struct EngagementAdapter {
    player_nr: u32,
}

impl EngagementAdapter {
    /// Adapter reading the gameplay of player `player_nr`
    pub fn new(player_nr: u32) -> Self {
        Self { player_nr }
    }

    pub fn player_nr(&self) -> u32 {
        self.player_nr
    }

    fn tracks(&self, gameplay: &Gameplay) -> bool {
        !gameplay.aborted && gameplay.player_nr.map_or(true, |nr| nr == self.player_nr)
    }
}

impl Default for EngagementAdapter {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SourceAdapter for EngagementAdapter {
    type Metrics = SessionMetrics;

    fn source(&self) -> DataSource {
        DataSource::Engagement
    }

    fn extract_record(
        &self,
        record: &ActivityRecord,
        metrics: &mut SessionMetrics,
        report: &mut MissingFieldReport,
    ) {
        let source = self.source();
        let data = read_property(
            record,
            source,
            PropertyKey::EngagementData,
            report,
            decode_nested::<EngagementData>,
        );
        let Some(data) = data else {
            metrics.hospital_trips.push(None);
            metrics.glucose_series.push(None);
            return;
        };

        let mut session = SessionBuilder::default();
        for entry in data.gameplay_data.unwrap_or_default() {
            let Some(raw) = entry.values.first() else {
                continue;
            };
            let gameplay = match decode_nested::<Gameplay>(raw) {
                Ok(gameplay) => gameplay,
                Err(message) => {
                    report.record(
                        source,
                        record.id,
                        PropertyKey::EngagementData,
                        MissingReason::Undecodable(format!("gameplay entry: {message}")),
                    );
                    continue;
                }
            };
            if !self.tracks(&gameplay) {
                debug!(
                    record_id = record.id,
                    aborted = gameplay.aborted,
                    player_nr = ?gameplay.player_nr,
                    "skipping gameplay entry"
                );
                continue;
            }
            for turn in &gameplay.turns {
                session.push_turn(turn);
            }
        }

        if let Some((hospital_trips, series)) = session.finish() {
            metrics.hospital_trips.push(Some(hospital_trips));
            metrics.glucose_series.push(Some(series));
        }
    }
}
