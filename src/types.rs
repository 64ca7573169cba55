//! Core types for the HDT scoring pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: per-session metrics, metrics overviews, normalized metrics, score
//! vectors and the persisted user snapshot.

use crate::error::ComputeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Activity data source for provenance and cursor tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// SugarVita playthrough summaries
    Playthrough,
    /// SugarVita engagement logs (per-turn gameplay)
    Engagement,
    /// Diabetes trivia answers
    Trivia,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [
        DataSource::Playthrough,
        DataSource::Engagement,
        DataSource::Trivia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Playthrough => "playthrough",
            DataSource::Engagement => "engagement",
            DataSource::Trivia => "trivia",
        }
    }

    /// GameBus data provider tag the external fetcher queries for this source
    pub fn provider_tag(&self) -> &'static str {
        match self {
            DataSource::Playthrough => "SUGARVITA_PLAYTHROUGH",
            DataSource::Engagement => "SUGARVITA_ENGAGEMENT_LOG_1",
            DataSource::Trivia => "ANSWER_TRIVIA_DIABETES",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single simulated blood glucose reading within a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    /// Glucose value (mmol/L)
    pub glucose: f64,
    /// In-game minute offset of the reading
    pub minute: f64,
}

impl GlucoseReading {
    pub fn new(glucose: f64, minute: f64) -> Self {
        Self { glucose, minute }
    }
}

/// Per-session metric lists for the game-session domain.
///
/// Each list is positionally aligned only within itself. `None` marks a value
/// that was absent or failed to decode; it survives until [`SessionMetrics::clean`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Final score per playthrough
    pub scores: Vec<Option<f64>>,
    /// Playtime per playthrough
    pub playtimes: Vec<Option<f64>>,
    /// Simulated days selected per playthrough
    pub days_played: Vec<Option<u32>>,
    /// Home path choices per playthrough
    pub home_path: Vec<Option<u32>>,
    /// Work path choices per playthrough
    pub work_path: Vec<Option<u32>>,
    /// Outdoors path choices per playthrough
    pub outdoors_path: Vec<Option<u32>>,
    /// Percentage of time glucose stayed in range per playthrough
    pub glucose_accuracy: Vec<Option<f64>>,
    /// Hospitalised turns per engagement session
    pub hospital_trips: Vec<Option<u32>>,
    /// Glucose series per engagement session
    pub glucose_series: Vec<Option<Vec<GlucoseReading>>>,
}

impl SessionMetrics {
    /// Append another batch's sessions after this one's
    pub fn absorb(&mut self, other: SessionMetrics) {
        self.scores.extend(other.scores);
        self.playtimes.extend(other.playtimes);
        self.days_played.extend(other.days_played);
        self.home_path.extend(other.home_path);
        self.work_path.extend(other.work_path);
        self.outdoors_path.extend(other.outdoors_path);
        self.glucose_accuracy.extend(other.glucose_accuracy);
        self.hospital_trips.extend(other.hospital_trips);
        self.glucose_series.extend(other.glucose_series);
    }

    /// Drop missing sentinels from every list
    pub fn clean(&self) -> CleanSessionMetrics {
        CleanSessionMetrics {
            scores: present(&self.scores),
            playtimes: present(&self.playtimes),
            days_played: present(&self.days_played),
            home_path: present(&self.home_path),
            work_path: present(&self.work_path),
            outdoors_path: present(&self.outdoors_path),
            glucose_accuracy: present(&self.glucose_accuracy),
            hospital_trips: present(&self.hospital_trips),
            glucose_series: present(&self.glucose_series),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
            && self.playtimes.is_empty()
            && self.days_played.is_empty()
            && self.glucose_accuracy.is_empty()
            && self.hospital_trips.is_empty()
            && self.glucose_series.is_empty()
    }
}

fn present<T: Clone>(values: &[Option<T>]) -> Vec<T> {
    values.iter().flatten().cloned().collect()
}

/// Session metrics with missing sentinels removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanSessionMetrics {
    pub scores: Vec<f64>,
    pub playtimes: Vec<f64>,
    pub days_played: Vec<u32>,
    pub home_path: Vec<u32>,
    pub work_path: Vec<u32>,
    pub outdoors_path: Vec<u32>,
    pub glucose_accuracy: Vec<f64>,
    pub hospital_trips: Vec<u32>,
    pub glucose_series: Vec<Vec<GlucoseReading>>,
}

/// Answer counts accumulated from trivia records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriviaCounts {
    /// Questions answered through a hint
    pub with_hint: u32,
    /// Questions answered without a hint
    pub without_hint: u32,
    pub easy: u32,
    pub normal: u32,
    pub hard: u32,
    /// Correct answers among those given without a hint
    pub correct: u32,
    /// Incorrect answers among those given without a hint
    pub incorrect: u32,
}

impl TriviaCounts {
    pub fn total_answers(&self) -> u32 {
        self.with_hint + self.without_hint
    }

    pub fn absorb(&mut self, other: TriviaCounts) {
        self.with_hint += other.with_hint;
        self.without_hint += other.without_hint;
        self.easy += other.easy;
        self.normal += other.normal;
        self.hard += other.hard;
        self.correct += other.correct;
        self.incorrect += other.incorrect;
    }
}

/// A statically known metric name within one overview domain
pub trait MetricKey: Copy + Ord + fmt::Debug + 'static {
    /// Domain name used in error messages
    const DOMAIN: &'static str;
    /// Every key of the domain, in overview order
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.as_str() == name)
    }
}

/// Player-type features derived from playthroughs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlayerTypeMetric {
    AvgScore,
    SdScore,
    AvgPlaytimes,
    SdPlaytimes,
    OneDaySession,
    TwoDaysSession,
    ThreeDaysSession,
    AvgDaysSession,
    SdDaysSession,
    TotalWorkPath,
    TotalHomePath,
    TotalOutdoorsPath,
}

impl MetricKey for PlayerTypeMetric {
    const DOMAIN: &'static str = "player_types";
    const ALL: &'static [Self] = &[
        PlayerTypeMetric::AvgScore,
        PlayerTypeMetric::SdScore,
        PlayerTypeMetric::AvgPlaytimes,
        PlayerTypeMetric::SdPlaytimes,
        PlayerTypeMetric::OneDaySession,
        PlayerTypeMetric::TwoDaysSession,
        PlayerTypeMetric::ThreeDaysSession,
        PlayerTypeMetric::AvgDaysSession,
        PlayerTypeMetric::SdDaysSession,
        PlayerTypeMetric::TotalWorkPath,
        PlayerTypeMetric::TotalHomePath,
        PlayerTypeMetric::TotalOutdoorsPath,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            PlayerTypeMetric::AvgScore => "avg_score",
            PlayerTypeMetric::SdScore => "sd_score",
            PlayerTypeMetric::AvgPlaytimes => "avg_playtimes",
            PlayerTypeMetric::SdPlaytimes => "sd_playtimes",
            PlayerTypeMetric::OneDaySession => "1_day_session",
            PlayerTypeMetric::TwoDaysSession => "2_days_session",
            PlayerTypeMetric::ThreeDaysSession => "3_days_session",
            PlayerTypeMetric::AvgDaysSession => "avg_days_session",
            PlayerTypeMetric::SdDaysSession => "sd_days_session",
            PlayerTypeMetric::TotalWorkPath => "total_work_path",
            PlayerTypeMetric::TotalHomePath => "total_home_path",
            PlayerTypeMetric::TotalOutdoorsPath => "total_outdoors_path",
        }
    }
}

/// Health-literacy features derived from game sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GameLiteracyMetric {
    /// Mean critical-response rate. Named "response" although it is a rate.
    AvgGlucoseCriticalValueResponse,
    TripsToHospitalPerGame,
    AvgGlucoseAccuracy,
}

impl MetricKey for GameLiteracyMetric {
    const DOMAIN: &'static str = "game_session";
    const ALL: &'static [Self] = &[
        GameLiteracyMetric::AvgGlucoseCriticalValueResponse,
        GameLiteracyMetric::TripsToHospitalPerGame,
        GameLiteracyMetric::AvgGlucoseAccuracy,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            GameLiteracyMetric::AvgGlucoseCriticalValueResponse => {
                "avg_glucose_critical_value_response"
            }
            GameLiteracyMetric::TripsToHospitalPerGame => "trips_to_hospital_per_game",
            GameLiteracyMetric::AvgGlucoseAccuracy => "avg_glucose_accuracy",
        }
    }
}

/// Health-literacy features derived from trivia answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TriviaMetric {
    AvgHint,
    AvgEasy,
    AvgNormal,
    AvgHard,
    AvgCorrect,
    AvgIncorrect,
}

impl MetricKey for TriviaMetric {
    const DOMAIN: &'static str = "trivia";
    const ALL: &'static [Self] = &[
        TriviaMetric::AvgHint,
        TriviaMetric::AvgEasy,
        TriviaMetric::AvgNormal,
        TriviaMetric::AvgHard,
        TriviaMetric::AvgCorrect,
        TriviaMetric::AvgIncorrect,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            TriviaMetric::AvgHint => "avg_hint",
            TriviaMetric::AvgEasy => "avg_easy",
            TriviaMetric::AvgNormal => "avg_normal",
            TriviaMetric::AvgHard => "avg_hard",
            TriviaMetric::AvgCorrect => "avg_correct",
            TriviaMetric::AvgIncorrect => "avg_incorrect",
        }
    }
}

/// Scalar aggregates for one domain, keyed by a fixed metric set.
///
/// Every key of `K::ALL` is always present. Decoding a stored overview with an
/// unknown or missing key fails with a configuration error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, f64>",
    into = "BTreeMap<String, f64>",
    bound = "K: MetricKey"
)]
pub struct MetricsOverview<K: MetricKey> {
    values: BTreeMap<K, f64>,
}

impl<K: MetricKey> MetricsOverview<K> {
    /// Build an overview by evaluating `value` for every key of the domain
    pub fn from_fn(mut value: impl FnMut(K) -> f64) -> Self {
        Self {
            values: K::ALL.iter().map(|&key| (key, value(key))).collect(),
        }
    }

    /// Fallible variant of [`MetricsOverview::from_fn`]
    pub fn try_from_fn(
        mut value: impl FnMut(K) -> Result<f64, ComputeError>,
    ) -> Result<Self, ComputeError> {
        let values = K::ALL
            .iter()
            .map(|&key| value(key).map(|v| (key, v)))
            .collect::<Result<_, _>>()?;
        Ok(Self { values })
    }

    /// Overview with every metric at zero
    pub fn zeroed() -> Self {
        Self::from_fn(|_| 0.0)
    }

    /// Build an overview from named values, rejecting unknown and missing keys
    pub fn try_from_named(named: BTreeMap<String, f64>) -> Result<Self, ComputeError> {
        let mut values = BTreeMap::new();
        for (name, value) in named {
            let key = K::from_name(&name).ok_or_else(|| ComputeError::UnknownMetric {
                domain: K::DOMAIN,
                key: name.clone(),
            })?;
            values.insert(key, value);
        }
        if let Some(missing) = K::ALL.iter().find(|key| !values.contains_key(*key)) {
            return Err(ComputeError::MissingMetric {
                domain: K::DOMAIN,
                key: missing.as_str().to_string(),
            });
        }
        Ok(Self { values })
    }

    /// Value for `key`
    pub fn get(&self, key: K) -> Result<f64, ComputeError> {
        self.values
            .get(&key)
            .copied()
            .ok_or_else(|| ComputeError::MissingMetric {
                domain: K::DOMAIN,
                key: key.as_str().to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.values.iter().map(|(&key, &value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: MetricKey> TryFrom<BTreeMap<String, f64>> for MetricsOverview<K> {
    type Error = ComputeError;

    fn try_from(named: BTreeMap<String, f64>) -> Result<Self, Self::Error> {
        Self::try_from_named(named)
    }
}

impl<K: MetricKey> From<MetricsOverview<K>> for BTreeMap<String, f64> {
    fn from(overview: MetricsOverview<K>) -> Self {
        overview
            .values
            .into_iter()
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect()
    }
}

/// Freshly aggregated overview of one poll.
///
/// A key whose aggregate had no samples in the poll holds `None`, so a merge
/// can keep the stored value instead of folding in a placeholder zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledOverview<K: MetricKey> {
    values: BTreeMap<K, Option<f64>>,
}

impl<K: MetricKey> SampledOverview<K> {
    pub fn from_fn(mut value: impl FnMut(K) -> Option<f64>) -> Self {
        Self {
            values: K::ALL.iter().map(|&key| (key, value(key))).collect(),
        }
    }

    /// Value for `key`, or `None` when it had no samples
    pub fn get(&self, key: K) -> Option<f64> {
        self.values.get(&key).copied().flatten()
    }

    /// Whether any key had samples
    pub fn has_samples(&self) -> bool {
        self.values.values().any(Option::is_some)
    }

    /// Complete overview, with keys lacking samples at 0
    pub fn to_overview(&self) -> MetricsOverview<K> {
        MetricsOverview::from_fn(|key| self.get(key).unwrap_or(0.0))
    }
}

/// Overview values rescaled into [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMetrics<K: MetricKey> {
    values: BTreeMap<K, f64>,
}

impl<K: MetricKey> NormalizedMetrics<K> {
    pub(crate) fn from_values(values: BTreeMap<K, f64>) -> Self {
        Self { values }
    }

    /// Normalized value for `key`
    pub fn get(&self, key: K) -> Result<f64, ComputeError> {
        self.values
            .get(&key)
            .copied()
            .ok_or_else(|| ComputeError::MissingMetric {
                domain: K::DOMAIN,
                key: key.as_str().to_string(),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, f64)> + '_ {
        self.values.iter().map(|(&key, &value)| (key, value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Behavioral archetype labels scored from playthrough features
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PlayerType {
    Socializer,
    Competitive,
    Explorer,
}

/// Scores keyed by a fixed label set; values are not bounded to [0, 1]
pub type ScoreVector<L> = BTreeMap<L, f64>;

/// Per-source health-literacy scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthLiteracySources {
    pub trivia: f64,
    pub game_session: f64,
}

/// Blended health-literacy score for one health domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLiteracyDomain {
    /// Health domain name (e.g. "diabetes")
    pub name: String,
    /// Blended score
    pub score: f64,
    pub sources: HealthLiteracySources,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLiteracyScore {
    pub domain: HealthLiteracyDomain,
}

/// Scores exposed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScores {
    pub health_literacy_score: HealthLiteracyScore,
    pub player_types_labels: ScoreVector<PlayerType>,
}

/// Player-type and health-literacy overviews of the game-session domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSessionOverviews {
    pub player_types: MetricsOverview<PlayerTypeMetric>,
    pub health_literacy: MetricsOverview<GameLiteracyMetric>,
}

/// Overviews a snapshot was computed from; `None` until a source has data
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsOverviews {
    pub trivia: Option<MetricsOverview<TriviaMetric>>,
    pub game_session: Option<GameSessionOverviews>,
}

/// Last record seen for one source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCursor {
    /// Highest record id processed; 0 means no prior cursor
    pub last_id: u64,
    /// Date of that record (dd-mm-yyyy), used by the fetcher's start filter
    pub last_date: Option<String>,
}

/// Per-user cursor over every data source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCursor {
    pub playthrough: SourceCursor,
    pub engagement: SourceCursor,
    pub trivia: SourceCursor,
}

impl UserCursor {
    pub fn get(&self, source: DataSource) -> &SourceCursor {
        match source {
            DataSource::Playthrough => &self.playthrough,
            DataSource::Engagement => &self.engagement,
            DataSource::Trivia => &self.trivia,
        }
    }

    pub fn get_mut(&mut self, source: DataSource) -> &mut SourceCursor {
        match source {
            DataSource::Playthrough => &mut self.playthrough,
            DataSource::Engagement => &mut self.engagement,
            DataSource::Trivia => &mut self.trivia,
        }
    }
}

/// Snapshot producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// One dated scoring result, appended to a user's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserScoreSnapshot {
    pub snapshot_id: Uuid,
    pub date: DateTime<Utc>,
    pub producer: SnapshotProducer,
    pub final_scores: FinalScores,
    pub metrics_overviews: MetricsOverviews,
    /// Cursor after this snapshot, so a processor can resume from it
    pub cursor: UserCursor,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overview_serializes_with_metric_names() {
        let overview = MetricsOverview::<GameLiteracyMetric>::from_fn(|key| match key {
            GameLiteracyMetric::AvgGlucoseCriticalValueResponse => 0.4,
            GameLiteracyMetric::TripsToHospitalPerGame => 1.0,
            GameLiteracyMetric::AvgGlucoseAccuracy => 75.0,
        });

        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["avg_glucose_critical_value_response"], 0.4);
        assert_eq!(json["trips_to_hospital_per_game"], 1.0);
        assert_eq!(json["avg_glucose_accuracy"], 75.0);

        let decoded: MetricsOverview<GameLiteracyMetric> = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, overview);
    }

    #[test]
    fn test_unknown_metric_is_configuration_error() {
        let mut named: BTreeMap<String, f64> = TriviaMetric::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), 0.0))
            .collect();
        named.insert("avg_guess".to_string(), 1.0);

        let err = MetricsOverview::<TriviaMetric>::try_from_named(named).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("avg_guess"));
    }

    #[test]
    fn test_missing_metric_is_configuration_error() {
        let json = r#"{"avg_hint": 0.5}"#;
        let result: Result<MetricsOverview<TriviaMetric>, _> = serde_json::from_str(json);
        assert!(result.is_err());

        let named: BTreeMap<String, f64> = [("avg_hint".to_string(), 0.5)].into_iter().collect();
        let err = MetricsOverview::<TriviaMetric>::try_from_named(named).unwrap_err();
        assert!(matches!(err, ComputeError::MissingMetric { .. }));
    }

    #[test]
    fn test_session_metrics_clean_drops_missing() {
        let metrics = SessionMetrics {
            scores: vec![Some(80.0), None, Some(60.0)],
            days_played: vec![None, Some(2)],
            ..Default::default()
        };

        let clean = metrics.clean();
        assert_eq!(clean.scores, vec![80.0, 60.0]);
        assert_eq!(clean.days_played, vec![2]);
        assert!(clean.playtimes.is_empty());
    }

    #[test]
    fn test_player_type_labels_serialize_by_name() {
        let mut scores = ScoreVector::new();
        scores.insert(PlayerType::Explorer, 0.25);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"Explorer":0.25}"#);
    }
}
