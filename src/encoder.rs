//! Snapshot encoding
//!
//! This module assembles scored results into dated `UserScoreSnapshot`s.
//! Every score must be finite; a NaN or infinite score is an encoding error
//! rather than a persisted value.

use crate::error::ComputeError;
use crate::scoring::WeightedScorer;
use crate::types::{
    FinalScores, HealthLiteracyDomain, HealthLiteracyScore, HealthLiteracySources,
    MetricsOverviews, PlayerType, ScoreVector, SnapshotProducer, UserCursor, UserScoreSnapshot,
};
use crate::{HDT_VERSION, PRODUCER_NAME};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Scores and provenance of one successful scoring run
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredUser {
    pub literacy: HealthLiteracySources,
    pub player_types: ScoreVector<PlayerType>,
    pub overviews: MetricsOverviews,
    pub cursor: UserCursor,
}

/// Snapshot encoder stamping producer metadata onto each snapshot
pub struct SnapshotEncoder {
    instance_id: String,
    domain_name: String,
}

impl SnapshotEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new(domain_name: impl Into<String>) -> Self {
        Self::with_instance_id(domain_name, Uuid::new_v4().to_string())
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(domain_name: impl Into<String>, instance_id: String) -> Self {
        Self {
            instance_id,
            domain_name: domain_name.into(),
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a scoring run dated now
    pub fn encode(&self, scored: ScoredUser) -> Result<UserScoreSnapshot, ComputeError> {
        self.encode_at(scored, Utc::now())
    }

    /// Encode a scoring run with an explicit date
    pub fn encode_at(
        &self,
        scored: ScoredUser,
        date: DateTime<Utc>,
    ) -> Result<UserScoreSnapshot, ComputeError> {
        let ScoredUser {
            literacy,
            player_types,
            overviews,
            cursor,
        } = scored;

        check_finite("health_literacy.trivia", literacy.trivia)?;
        check_finite("health_literacy.game_session", literacy.game_session)?;
        for (label, score) in &player_types {
            check_finite(&format!("player_types.{label:?}"), *score)?;
        }
        let blended = WeightedScorer::blend(&literacy);
        check_finite("health_literacy", blended)?;

        let final_scores = FinalScores {
            health_literacy_score: HealthLiteracyScore {
                domain: HealthLiteracyDomain {
                    name: self.domain_name.clone(),
                    score: blended,
                    sources: literacy,
                },
            },
            player_types_labels: player_types,
        };

        Ok(UserScoreSnapshot {
            snapshot_id: Uuid::new_v4(),
            date,
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: HDT_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            final_scores,
            metrics_overviews: overviews,
            cursor,
        })
    }

    /// Encode to JSON string
    pub fn encode_to_json(&self, scored: ScoredUser) -> Result<String, ComputeError> {
        let snapshot = self.encode(scored)?;
        serde_json::to_string_pretty(&snapshot).map_err(ComputeError::JsonError)
    }
}

fn check_finite(field: &str, value: f64) -> Result<(), ComputeError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ComputeError::EncodingError(format!(
            "{field} is not a finite score: {value}"
        )))
    }
}
