//! Session aggregation
//!
//! Reduces cleaned per-session metric lists into the scalar overviews of each
//! domain. Means and stdevs are not rounded. An aggregate over zero samples,
//! or a ratio whose denominator is 0, has no value for the poll.

use crate::types::{
    CleanSessionMetrics, GameLiteracyMetric, PlayerTypeMetric, SampledOverview, TriviaCounts,
    TriviaMetric,
};

/// Arithmetic mean; 0 for no samples
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divisor N); 0 for fewer than two samples
pub fn pstdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// `numerator / denominator`, or `None` when the denominator is 0
fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// `aggregate(values)`, or `None` for no samples
fn sampled<T>(values: &[T], aggregate: impl FnOnce(&[T]) -> f64) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(aggregate(values))
    }
}

fn as_f64(values: &[u32]) -> Vec<f64> {
    values.iter().map(|&v| f64::from(v)).collect()
}

fn total(values: &[u32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum()
}

/// Aggregator from session metrics to metrics overviews
pub struct SessionAggregator;

impl SessionAggregator {
    /// Player-type overview from playthrough sessions
    pub fn player_types(metrics: &CleanSessionMetrics) -> SampledOverview<PlayerTypeMetric> {
        let days = as_f64(&metrics.days_played);
        let sessions_of = |n: u32| {
            sampled(&metrics.days_played, |days| {
                days.iter().filter(|&&d| d == n).count() as f64
            })
        };

        SampledOverview::from_fn(|key| match key {
            PlayerTypeMetric::AvgScore => sampled(&metrics.scores, mean),
            PlayerTypeMetric::SdScore => sampled(&metrics.scores, pstdev),
            PlayerTypeMetric::AvgPlaytimes => sampled(&metrics.playtimes, mean),
            PlayerTypeMetric::SdPlaytimes => sampled(&metrics.playtimes, pstdev),
            PlayerTypeMetric::OneDaySession => sessions_of(1),
            PlayerTypeMetric::TwoDaysSession => sessions_of(2),
            PlayerTypeMetric::ThreeDaysSession => sessions_of(3),
            PlayerTypeMetric::AvgDaysSession => sampled(&days, mean),
            PlayerTypeMetric::SdDaysSession => sampled(&days, pstdev),
            PlayerTypeMetric::TotalWorkPath => sampled(&metrics.work_path, total),
            PlayerTypeMetric::TotalHomePath => sampled(&metrics.home_path, total),
            PlayerTypeMetric::TotalOutdoorsPath => sampled(&metrics.outdoors_path, total),
        })
    }

    /// Game-session literacy overview.
    ///
    /// `response_rates` are the critical-response rates of every session.
    pub fn game_literacy(
        metrics: &CleanSessionMetrics,
        response_rates: &[f64],
    ) -> SampledOverview<GameLiteracyMetric> {
        SampledOverview::from_fn(|key| match key {
            GameLiteracyMetric::AvgGlucoseCriticalValueResponse => sampled(response_rates, mean),
            GameLiteracyMetric::TripsToHospitalPerGame => ratio(
                total(&metrics.hospital_trips),
                metrics.hospital_trips.len() as f64,
            ),
            GameLiteracyMetric::AvgGlucoseAccuracy => sampled(&metrics.glucose_accuracy, mean),
        })
    }

    /// Trivia literacy overview from answer counts
    pub fn trivia(counts: &TriviaCounts) -> SampledOverview<TriviaMetric> {
        let answers = f64::from(counts.total_answers());
        let unhinted = f64::from(counts.without_hint);

        SampledOverview::from_fn(|key| match key {
            TriviaMetric::AvgHint => ratio(f64::from(counts.with_hint), answers),
            TriviaMetric::AvgEasy => ratio(f64::from(counts.easy), answers),
            TriviaMetric::AvgNormal => ratio(f64::from(counts.normal), answers),
            TriviaMetric::AvgHard => ratio(f64::from(counts.hard), answers),
            TriviaMetric::AvgCorrect => ratio(f64::from(counts.correct), unhinted),
            TriviaMetric::AvgIncorrect => ratio(f64::from(counts.incorrect), unhinted),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GlucoseReading, MetricKey};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mean_and_pstdev() {
        assert!((mean(&[4.0, 6.0, 8.0]) - 6.0).abs() < 1e-12);
        assert!((pstdev(&[4.0, 6.0, 8.0]) - 1.632_993).abs() < 1e-6);
        assert_eq!(pstdev(&[5.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(pstdev(&[]), 0.0);
    }

    #[test]
    fn test_single_session_overview() {
        let metrics = CleanSessionMetrics {
            scores: vec![80.0],
            playtimes: vec![600.0],
            days_played: vec![2],
            home_path: vec![1],
            work_path: vec![0],
            outdoors_path: vec![2],
            ..Default::default()
        };

        let overview = SessionAggregator::player_types(&metrics);
        let expected = [
            (PlayerTypeMetric::AvgScore, 80.0),
            (PlayerTypeMetric::SdScore, 0.0),
            (PlayerTypeMetric::AvgPlaytimes, 600.0),
            (PlayerTypeMetric::SdPlaytimes, 0.0),
            (PlayerTypeMetric::OneDaySession, 0.0),
            (PlayerTypeMetric::TwoDaysSession, 1.0),
            (PlayerTypeMetric::ThreeDaysSession, 0.0),
            (PlayerTypeMetric::AvgDaysSession, 2.0),
            (PlayerTypeMetric::SdDaysSession, 0.0),
            (PlayerTypeMetric::TotalWorkPath, 0.0),
            (PlayerTypeMetric::TotalHomePath, 1.0),
            (PlayerTypeMetric::TotalOutdoorsPath, 2.0),
        ];
        assert_eq!(overview.to_overview().len(), PlayerTypeMetric::ALL.len());
        for (key, value) in expected {
            assert_eq!(overview.get(key), Some(value), "{}", key.as_str());
        }
    }

    #[test]
    fn test_game_literacy_overview() {
        let metrics = CleanSessionMetrics {
            glucose_accuracy: vec![70.0, 80.0],
            hospital_trips: vec![1, 0, 2],
            glucose_series: vec![vec![GlucoseReading::new(2.0, 0.0)]],
            ..Default::default()
        };

        let overview = SessionAggregator::game_literacy(&metrics, &[0.4, 0.2]);
        let response = overview
            .get(GameLiteracyMetric::AvgGlucoseCriticalValueResponse)
            .unwrap();
        assert!((response - 0.3).abs() < 1e-12);
        assert_eq!(overview.get(GameLiteracyMetric::TripsToHospitalPerGame), Some(1.0));
        assert_eq!(overview.get(GameLiteracyMetric::AvgGlucoseAccuracy), Some(75.0));
    }

    #[test]
    fn test_keys_without_samples_have_no_value() {
        let game = SessionAggregator::game_literacy(&CleanSessionMetrics::default(), &[]);
        assert!(!game.has_samples());
        assert!(game.to_overview().iter().all(|(_, value)| value == 0.0));

        let trivia = SessionAggregator::trivia(&TriviaCounts::default());
        assert!(!trivia.has_samples());

        // Playthrough fields only: engagement-fed keys stay empty
        let playthrough_only = CleanSessionMetrics {
            glucose_accuracy: vec![70.0],
            ..Default::default()
        };
        let game = SessionAggregator::game_literacy(&playthrough_only, &[]);
        assert_eq!(game.get(GameLiteracyMetric::AvgGlucoseAccuracy), Some(70.0));
        assert_eq!(game.get(GameLiteracyMetric::AvgGlucoseCriticalValueResponse), None);
        assert_eq!(game.get(GameLiteracyMetric::TripsToHospitalPerGame), None);

        // Every answer used a hint: correctness ratios have no denominator
        let hinted = TriviaCounts {
            with_hint: 2,
            easy: 2,
            ..Default::default()
        };
        let trivia = SessionAggregator::trivia(&hinted);
        assert_eq!(trivia.get(TriviaMetric::AvgHint), Some(1.0));
        assert_eq!(trivia.get(TriviaMetric::AvgCorrect), None);
        assert_eq!(trivia.get(TriviaMetric::AvgIncorrect), None);
    }

    #[test]
    fn test_trivia_ratios() {
        let counts = TriviaCounts {
            with_hint: 1,
            without_hint: 3,
            easy: 1,
            normal: 1,
            hard: 2,
            correct: 2,
            incorrect: 1,
        };

        let overview = SessionAggregator::trivia(&counts);
        assert_eq!(overview.get(TriviaMetric::AvgHint), Some(0.25));
        assert_eq!(overview.get(TriviaMetric::AvgHard), Some(0.5));
        assert!((overview.get(TriviaMetric::AvgCorrect).unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((overview.get(TriviaMetric::AvgIncorrect).unwrap() - 1.0 / 3.0).abs() < 1e-12);
    }
}
