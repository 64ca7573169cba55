//! Pipeline orchestration
//!
//! This module provides the public API for HDT scoring.
//! It orchestrates one poll of a user from activity records to a score snapshot.

use crate::adapters::{
    EngagementAdapter, MissingFieldReport, PlaythroughAdapter, SourceAdapter, TriviaAdapter,
};
use crate::aggregator::SessionAggregator;
use crate::config::ProcessorConfig;
use crate::encoder::{ScoredUser, SnapshotEncoder};
use crate::error::ComputeError;
use crate::glucose::GlucoseAnalyzer;
use crate::merge::merge_sampled;
use crate::normalizer::Normalizer;
use crate::schema::{ActivityBatch, ActivityRecord, LatestRecord};
use crate::scoring::WeightedScorer;
use crate::types::{
    DataSource, GameSessionOverviews, HealthLiteracySources, MetricKey, MetricsOverview,
    MetricsOverviews, NormalizedMetrics, SourceCursor, UserCursor, UserScoreSnapshot,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Activity records of one user for one poll, per source
#[derive(Debug, Clone, Default)]
pub struct PollInput {
    pub playthrough: Vec<ActivityRecord>,
    pub engagement: Vec<ActivityRecord>,
    pub trivia: Vec<ActivityRecord>,
}

impl PollInput {
    /// Decode one JSON record array per source; empty strings are empty batches
    pub fn from_json(
        playthrough: &str,
        engagement: &str,
        trivia: &str,
    ) -> Result<Self, ComputeError> {
        Ok(Self {
            playthrough: ActivityBatch::parse(playthrough, DataSource::Playthrough)?,
            engagement: ActivityBatch::parse(engagement, DataSource::Engagement)?,
            trivia: ActivityBatch::parse(trivia, DataSource::Trivia)?,
        })
    }

    pub fn records(&self, source: DataSource) -> &[ActivityRecord] {
        match source {
            DataSource::Playthrough => &self.playthrough,
            DataSource::Engagement => &self.engagement,
            DataSource::Trivia => &self.trivia,
        }
    }
}

/// A successful scoring poll
#[derive(Debug, Clone)]
pub struct PollReport {
    pub snapshot: UserScoreSnapshot,
    /// Fields that fell back to missing sentinels
    pub missing: MissingFieldReport,
    /// Records past the cursor read per source
    pub records_read: BTreeMap<DataSource, usize>,
}

/// Result of polling a user
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// No source has records past the cursor, or none of the new records held
    /// usable data; nothing to persist
    NoNewData,
    Scored(Box<PollReport>),
}

/// State carried between polls of one user
#[derive(Debug, Clone, Default, PartialEq)]
struct TwinState {
    overviews: MetricsOverviews,
    cursor: UserCursor,
}

/// Stateful per-user processor for incremental scoring.
///
/// Each poll reads only records past the cursor, merges the fresh overviews
/// into the stored ones and scores the result. State is committed only after
/// the whole poll succeeded; a failed poll leaves the processor unchanged.
pub struct TwinProcessor {
    config: ProcessorConfig,
    encoder: SnapshotEncoder,
    state: TwinState,
}

impl Default for TwinProcessor {
    fn default() -> Self {
        Self::new(ProcessorConfig::default())
    }
}

impl TwinProcessor {
    /// Create a processor with no prior state
    pub fn new(config: ProcessorConfig) -> Self {
        let encoder = SnapshotEncoder::new(config.domain_name.clone());
        Self {
            config,
            encoder,
            state: TwinState::default(),
        }
    }

    /// Create a processor continuing from a user's latest snapshot
    pub fn resume(config: ProcessorConfig, latest: &UserScoreSnapshot) -> Self {
        let mut processor = Self::new(config);
        processor.state = TwinState {
            overviews: latest.metrics_overviews.clone(),
            cursor: latest.cursor.clone(),
        };
        processor
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn cursor(&self) -> &UserCursor {
        &self.state.cursor
    }

    pub fn overviews(&self) -> &MetricsOverviews {
        &self.state.overviews
    }

    /// Run one poll over the given records
    pub fn poll(&mut self, input: &PollInput) -> Result<PollOutcome, ComputeError> {
        let cursor = &self.state.cursor;
        let has_new = DataSource::ALL.iter().any(|&source| {
            ActivityBatch::has_new_records(input.records(source), cursor.get(source).last_id)
        });
        if !has_new {
            info!("no new activity records; skipping poll");
            return Ok(PollOutcome::NoNewData);
        }

        let mut next = self.state.clone();
        let mut missing = MissingFieldReport::default();
        let mut records_read = BTreeMap::new();
        let mut latest: BTreeMap<DataSource, LatestRecord> = BTreeMap::new();

        let playthrough = PlaythroughAdapter.extract(
            &input.playthrough,
            next.cursor.playthrough.last_id,
        );
        let engagement = EngagementAdapter::new(self.config.player_nr)
            .extract(&input.engagement, next.cursor.engagement.last_id);
        let trivia = TriviaAdapter.extract(&input.trivia, next.cursor.trivia.last_id);

        for (source, read, newest) in [
            (DataSource::Playthrough, playthrough.records_read, playthrough.latest),
            (DataSource::Engagement, engagement.records_read, engagement.latest),
            (DataSource::Trivia, trivia.records_read, trivia.latest),
        ] {
            records_read.insert(source, read);
            if let Some(newest) = newest {
                latest.insert(source, newest);
            }
        }
        missing.absorb(playthrough.report);
        missing.absorb(engagement.report);
        missing.absorb(trivia.report);

        for (source, newest) in &latest {
            *next.cursor.get_mut(*source) = SourceCursor {
                last_id: newest.id,
                last_date: newest.cursor_date(),
            };
        }

        let mut usable = false;

        // Game-session domain
        if playthrough.records_read > 0 || engagement.records_read > 0 {
            let mut sessions = playthrough.metrics;
            sessions.absorb(engagement.metrics);
            let clean = sessions.clean();

            let rates = GlucoseAnalyzer::response_rates(&clean.glucose_series);
            debug!(
                sessions = clean.glucose_series.len(),
                events = rates.len(),
                "analyzed glucose series"
            );

            let fresh_types = SessionAggregator::player_types(&clean);
            let fresh_literacy = SessionAggregator::game_literacy(&clean, &rates);
            if fresh_types.has_samples() || fresh_literacy.has_samples() {
                usable = true;
                let prior = next.overviews.game_session.as_ref();
                let player_types =
                    merge_sampled(prior.map(|p| &p.player_types), &fresh_types)?;
                let health_literacy =
                    merge_sampled(prior.map(|p| &p.health_literacy), &fresh_literacy)?;
                next.overviews.game_session = Some(GameSessionOverviews {
                    player_types: player_types.unwrap_or_else(MetricsOverview::zeroed),
                    health_literacy: health_literacy.unwrap_or_else(MetricsOverview::zeroed),
                });
            } else {
                debug!("game-session records held no usable samples");
            }
        }

        // Trivia domain
        if trivia.records_read > 0 {
            let fresh = SessionAggregator::trivia(&trivia.metrics);
            if fresh.has_samples() {
                usable = true;
                next.overviews.trivia = merge_sampled(next.overviews.trivia.as_ref(), &fresh)?;
            } else {
                debug!("trivia records held no usable samples");
            }
        }

        if !usable {
            info!(
                missing_fields = missing.len(),
                "new activity records held no usable data; advancing cursor only"
            );
            self.state.cursor = next.cursor;
            return Ok(PollOutcome::NoNewData);
        }

        let game = next.overviews.game_session.as_ref();
        let player_types = score_overview(
            game.map(|g| &g.player_types),
            WeightedScorer::player_types,
        )?;
        let literacy = HealthLiteracySources {
            trivia: score_overview(next.overviews.trivia.as_ref(), WeightedScorer::trivia_literacy)?,
            game_session: score_overview(
                game.map(|g| &g.health_literacy),
                WeightedScorer::game_literacy,
            )?,
        };

        let snapshot = self.encoder.encode(ScoredUser {
            literacy,
            player_types,
            overviews: next.overviews.clone(),
            cursor: next.cursor.clone(),
        })?;

        info!(
            snapshot_id = %snapshot.snapshot_id,
            health_literacy = snapshot.final_scores.health_literacy_score.domain.score,
            playthrough = records_read.get(&DataSource::Playthrough).copied().unwrap_or(0),
            engagement = records_read.get(&DataSource::Engagement).copied().unwrap_or(0),
            trivia = records_read.get(&DataSource::Trivia).copied().unwrap_or(0),
            missing_fields = missing.len(),
            "scored poll"
        );

        self.state = next;
        Ok(PollOutcome::Scored(Box::new(PollReport {
            snapshot,
            missing,
            records_read,
        })))
    }
}

/// Normalize and score an overview; a domain without data scores as all zeros
fn score_overview<K: MetricKey, T>(
    overview: Option<&MetricsOverview<K>>,
    score: impl FnOnce(&NormalizedMetrics<K>) -> Result<T, ComputeError>,
) -> Result<T, ComputeError> {
    let normalized = match overview {
        Some(overview) => Normalizer::normalize(overview),
        None => Normalizer::normalize(&MetricsOverview::<K>::zeroed()),
    };
    score(&normalized)
}

/// Score one batch of activity JSON with no prior state.
///
/// Returns the snapshot JSON, or `None` when the batches hold no records.
///
/// # Example
/// ```ignore
/// let snapshot = activity_to_snapshot(&playthrough_json, &engagement_json, &trivia_json)?;
/// ```
pub fn activity_to_snapshot(
    playthrough_json: &str,
    engagement_json: &str,
    trivia_json: &str,
) -> Result<Option<String>, ComputeError> {
    let input = PollInput::from_json(playthrough_json, engagement_json, trivia_json)?;
    match TwinProcessor::default().poll(&input)? {
        PollOutcome::NoNewData => Ok(None),
        PollOutcome::Scored(report) => serde_json::to_string_pretty(&report.snapshot)
            .map(Some)
            .map_err(ComputeError::JsonError),
    }
}
