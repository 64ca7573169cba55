//! Weighted scoring
//!
//! Scores are linear combinations of normalized metrics with static weights.
//! Weights may be negative and are not rescaled, so scores can leave [0, 1].

use crate::error::ComputeError;
use crate::types::{
    GameLiteracyMetric, HealthLiteracySources, MetricKey, NormalizedMetrics, PlayerType,
    PlayerTypeMetric, ScoreVector, TriviaMetric,
};

/// Static weight per metric key
pub type WeightTable<K> = &'static [(K, f64)];

pub const SOCIALIZER_WEIGHTS: WeightTable<PlayerTypeMetric> = &[
    (PlayerTypeMetric::AvgScore, 0.0),
    (PlayerTypeMetric::SdScore, 0.0),
    (PlayerTypeMetric::AvgPlaytimes, 0.0),
    (PlayerTypeMetric::SdPlaytimes, 0.0),
    (PlayerTypeMetric::OneDaySession, 0.0),
    (PlayerTypeMetric::TwoDaysSession, 0.0),
    (PlayerTypeMetric::ThreeDaysSession, 0.0),
    (PlayerTypeMetric::AvgDaysSession, 0.0),
    (PlayerTypeMetric::SdDaysSession, 0.0),
    (PlayerTypeMetric::TotalWorkPath, 0.5),
    (PlayerTypeMetric::TotalHomePath, 0.0),
    (PlayerTypeMetric::TotalOutdoorsPath, 0.5),
];

pub const COMPETITIVE_WEIGHTS: WeightTable<PlayerTypeMetric> = &[
    (PlayerTypeMetric::AvgScore, 0.3),
    (PlayerTypeMetric::SdScore, 0.05),
    (PlayerTypeMetric::AvgPlaytimes, 0.0),
    (PlayerTypeMetric::SdPlaytimes, 0.0),
    (PlayerTypeMetric::OneDaySession, 0.2),
    (PlayerTypeMetric::TwoDaysSession, 0.1),
    (PlayerTypeMetric::ThreeDaysSession, 0.0),
    (PlayerTypeMetric::AvgDaysSession, 0.1),
    (PlayerTypeMetric::SdDaysSession, 0.05),
    (PlayerTypeMetric::TotalWorkPath, 0.1),
    (PlayerTypeMetric::TotalHomePath, 0.05),
    (PlayerTypeMetric::TotalOutdoorsPath, 0.05),
];

pub const EXPLORER_WEIGHTS: WeightTable<PlayerTypeMetric> = &[
    (PlayerTypeMetric::AvgScore, 0.0),
    (PlayerTypeMetric::SdScore, 0.0),
    (PlayerTypeMetric::AvgPlaytimes, 0.3),
    (PlayerTypeMetric::SdPlaytimes, 0.05),
    (PlayerTypeMetric::OneDaySession, 0.0),
    (PlayerTypeMetric::TwoDaysSession, 0.1),
    (PlayerTypeMetric::ThreeDaysSession, 0.15),
    (PlayerTypeMetric::AvgDaysSession, 0.15),
    (PlayerTypeMetric::SdDaysSession, 0.05),
    (PlayerTypeMetric::TotalWorkPath, 0.05),
    (PlayerTypeMetric::TotalHomePath, 0.05),
    (PlayerTypeMetric::TotalOutdoorsPath, 0.1),
];

pub const TRIVIA_WEIGHTS: WeightTable<TriviaMetric> = &[
    (TriviaMetric::AvgHint, 0.15),
    (TriviaMetric::AvgEasy, 0.1),
    (TriviaMetric::AvgNormal, 0.2),
    (TriviaMetric::AvgHard, 0.3),
    (TriviaMetric::AvgCorrect, 0.35),
    (TriviaMetric::AvgIncorrect, -1.0),
];

pub const GAME_SESSION_WEIGHTS: WeightTable<GameLiteracyMetric> = &[
    (GameLiteracyMetric::AvgGlucoseCriticalValueResponse, 0.15),
    (GameLiteracyMetric::TripsToHospitalPerGame, -1.0),
    (GameLiteracyMetric::AvgGlucoseAccuracy, 0.85),
];

/// Blend weight of the trivia health-literacy score
pub const TRIVIA_BLEND_WEIGHT: f64 = 0.6;
/// Blend weight of the game-session health-literacy score
pub const GAME_SESSION_BLEND_WEIGHT: f64 = 0.4;

/// `Σ weight_k × normalized_k`; a weighted key absent from `normalized` is an error
pub fn weighted_score<K: MetricKey>(
    weights: WeightTable<K>,
    normalized: &NormalizedMetrics<K>,
) -> Result<f64, ComputeError> {
    weights
        .iter()
        .try_fold(0.0, |score, &(key, weight)| -> Result<f64, ComputeError> {
            Ok(score + weight * normalized.get(key)?)
        })
}

/// Scorer from normalized metrics to score vectors
pub struct WeightedScorer;

impl WeightedScorer {
    /// Affinity per player type
    pub fn player_types(
        normalized: &NormalizedMetrics<PlayerTypeMetric>,
    ) -> Result<ScoreVector<PlayerType>, ComputeError> {
        let mut scores = ScoreVector::new();
        scores.insert(
            PlayerType::Socializer,
            weighted_score(SOCIALIZER_WEIGHTS, normalized)?,
        );
        scores.insert(
            PlayerType::Competitive,
            weighted_score(COMPETITIVE_WEIGHTS, normalized)?,
        );
        scores.insert(
            PlayerType::Explorer,
            weighted_score(EXPLORER_WEIGHTS, normalized)?,
        );
        Ok(scores)
    }

    /// Health-literacy score of the trivia source
    pub fn trivia_literacy(normalized: &NormalizedMetrics<TriviaMetric>) -> Result<f64, ComputeError> {
        weighted_score(TRIVIA_WEIGHTS, normalized)
    }

    /// Health-literacy score of the game-session source
    pub fn game_literacy(
        normalized: &NormalizedMetrics<GameLiteracyMetric>,
    ) -> Result<f64, ComputeError> {
        weighted_score(GAME_SESSION_WEIGHTS, normalized)
    }

    /// Convex blend of the per-source health-literacy scores
    pub fn blend(sources: &HealthLiteracySources) -> f64 {
        TRIVIA_BLEND_WEIGHT * sources.trivia + GAME_SESSION_BLEND_WEIGHT * sources.game_session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn uniform<K: MetricKey>(value: f64) -> NormalizedMetrics<K> {
        NormalizedMetrics::from_values(K::ALL.iter().map(|&key| (key, value)).collect())
    }

    fn weight_sum<K>(weights: WeightTable<K>) -> f64 {
        weights.iter().map(|(_, w)| w).sum()
    }

    #[test]
    fn test_weight_tables_cover_every_key() {
        for table in [SOCIALIZER_WEIGHTS, COMPETITIVE_WEIGHTS, EXPLORER_WEIGHTS] {
            assert_eq!(table.len(), PlayerTypeMetric::ALL.len());
        }
        assert_eq!(TRIVIA_WEIGHTS.len(), TriviaMetric::ALL.len());
        assert_eq!(GAME_SESSION_WEIGHTS.len(), GameLiteracyMetric::ALL.len());
    }

    #[test]
    fn test_half_inputs_score_half_weight_sum() {
        let scores = WeightedScorer::player_types(&uniform(0.5)).unwrap();
        assert!((scores[&PlayerType::Socializer] - 0.5 * weight_sum(SOCIALIZER_WEIGHTS)).abs() < 1e-12);
        assert!((scores[&PlayerType::Competitive] - 0.5 * weight_sum(COMPETITIVE_WEIGHTS)).abs() < 1e-12);
        assert!((scores[&PlayerType::Explorer] - 0.5 * weight_sum(EXPLORER_WEIGHTS)).abs() < 1e-12);

        let trivia = WeightedScorer::trivia_literacy(&uniform(0.5)).unwrap();
        assert!((trivia - 0.5 * weight_sum(TRIVIA_WEIGHTS)).abs() < 1e-12);

        let game = WeightedScorer::game_literacy(&uniform(0.5)).unwrap();
        assert!((game - 0.5 * weight_sum(GAME_SESSION_WEIGHTS)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_weights_can_leave_unit_interval() {
        let mut values: BTreeMap<TriviaMetric, f64> =
            TriviaMetric::ALL.iter().map(|&key| (key, 0.0)).collect();
        values.insert(TriviaMetric::AvgIncorrect, 1.0);

        let score = WeightedScorer::trivia_literacy(&NormalizedMetrics::from_values(values)).unwrap();
        assert_eq!(score, -1.0);
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let values: BTreeMap<GameLiteracyMetric, f64> =
            [(GameLiteracyMetric::AvgGlucoseAccuracy, 1.0)].into_iter().collect();

        let err = WeightedScorer::game_literacy(&NormalizedMetrics::from_values(values)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_blend() {
        let sources = HealthLiteracySources {
            trivia: 0.5,
            game_session: 0.25,
        };
        assert!((WeightedScorer::blend(&sources) - 0.4).abs() < 1e-12);
    }
}
