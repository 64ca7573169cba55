//! SugarVita playthrough adapter
//!
//! Each playthrough record is one session: final score, playtime, glucose
//! range percentage, and a nested `PLAYTHROUGH_DATA` document holding the
//! simulated days and the path chosen on every turn.

use crate::schema::{ActivityRecord, PropertyKey};
use crate::types::{DataSource, SessionMetrics};
use serde::Deserialize;

use super::{coerce_int, decode_nested, read_property, MissingFieldReport, SourceAdapter};

/// Path a player chose to move along on a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    Home,
    Outdoors,
    Work,
}

impl PathType {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PathType::Home),
            2 => Some(PathType::Outdoors),
            3 => Some(PathType::Work),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaythroughData {
    days_played: u32,
    #[serde(default)]
    turns: Vec<PlaythroughTurn>,
}

#[derive(Debug, Deserialize)]
struct PlaythroughTurn {
    #[serde(rename = "DestinationPathType", default)]
    destination_path_type: Option<i64>,
}

/// Path choice totals for one playthrough
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PathCounts {
    home: u32,
    outdoors: u32,
    work: u32,
}

impl PathCounts {
    fn from_turns(turns: &[PlaythroughTurn]) -> Self {
        let mut counts = PathCounts::default();
        for path in turns
            .iter()
            .filter_map(|turn| turn.destination_path_type.and_then(PathType::from_code))
        {
            match path {
                PathType::Home => counts.home += 1,
                PathType::Outdoors => counts.outdoors += 1,
                PathType::Work => counts.work += 1,
            }
        }
        counts
    }
}

/// Playthrough payload adapter
pub struct PlaythroughAdapter;

impl SourceAdapter for PlaythroughAdapter {
    type Metrics = SessionMetrics;

    fn source(&self) -> DataSource {
        DataSource::Playthrough
    }

    fn extract_record(
        &self,
        record: &ActivityRecord,
        metrics: &mut SessionMetrics,
        report: &mut MissingFieldReport,
    ) {
        let source = self.source();

        let score = read_property(record, source, PropertyKey::Score, report, coerce_int);
        metrics.scores.push(score.map(|v| v as f64));

        let playtime = read_property(record, source, PropertyKey::Playtime, report, coerce_int);
        metrics.playtimes.push(playtime.map(|v| v as f64));

        // Older records predate this property, so absence is common
        let accuracy = read_property(
            record,
            source,
            PropertyKey::GlucoseRangePercentage,
            report,
            coerce_int,
        );
        metrics.glucose_accuracy.push(accuracy.map(|v| v as f64));

        let data = read_property(
            record,
            source,
            PropertyKey::PlaythroughData,
            report,
            decode_nested::<PlaythroughData>,
        );
        match data {
            Some(data) => {
                let paths = PathCounts::from_turns(&data.turns);
                metrics.days_played.push(Some(data.days_played));
                metrics.home_path.push(Some(paths.home));
                metrics.work_path.push(Some(paths.work));
                metrics.outdoors_path.push(Some(paths.outdoors));
            }
            None => {
                metrics.days_played.push(None);
                metrics.home_path.push(None);
                metrics.work_path.push(None);
                metrics.outdoors_path.push(None);
            }
        }
    }
}
