//! Snapshot history
//!
//! This module persists each user's append-only list of dated score
//! snapshots. Consumers read the latest entry; the full history is retained.
//!
//! On disk the store is a single JSON document:
//!
//! ```json
//! { "users": { "42": { "entries": [ { "snapshot_id": "...", ... } ] } } }
//! ```

use crate::error::ComputeError;
use crate::types::UserScoreSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Ordered snapshots of one user, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    #[serde(default)]
    entries: Vec<UserScoreSnapshot>,
}

impl UserHistory {
    pub fn entries(&self) -> &[UserScoreSnapshot] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&UserScoreSnapshot> {
        self.entries.last()
    }
}

/// Snapshot store keyed by user id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStore {
    #[serde(default)]
    users: BTreeMap<String, UserHistory>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot to a user's history
    pub fn append(&mut self, user_id: &str, snapshot: UserScoreSnapshot) {
        let history = self.users.entry(user_id.to_string()).or_default();
        history.entries.push(snapshot);
        debug!(user_id, entries = history.entries.len(), "appended snapshot");
    }

    /// Latest snapshot of a user; `None` means no data yet
    pub fn latest(&self, user_id: &str) -> Option<&UserScoreSnapshot> {
        self.users.get(user_id).and_then(UserHistory::latest)
    }

    /// Full history of a user, oldest first
    pub fn history(&self, user_id: &str) -> &[UserScoreSnapshot] {
        self.users
            .get(user_id)
            .map(UserHistory::entries)
            .unwrap_or_default()
    }

    pub fn user_ids(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    /// Load store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Save store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a store file.
    ///
    /// A missing or empty file is an empty store. A file that does not decode
    /// is an error, so an unreadable history is never silently replaced.
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot store yet");
            return Ok(Self::new());
        }
        let json = fs::read_to_string(path)?;
        if json.trim().is_empty() {
            return Ok(Self::new());
        }
        Self::from_json(&json).map_err(|e| {
            ComputeError::StorageError(format!("corrupt snapshot store {}: {e}", path.display()))
        })
    }

    /// Write the store through a temporary sibling file, then rename it into place
    pub fn save(&self, path: &Path) -> Result<(), ComputeError> {
        let json = self.to_json()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        fs::write(tmp, json)?;
        fs::rename(tmp, path)?;
        debug!(path = %path.display(), "saved snapshot store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        FinalScores, HealthLiteracyDomain, HealthLiteracyScore, HealthLiteracySources,
        MetricsOverviews, ScoreVector, SnapshotProducer, UserCursor,
    };
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn make_snapshot(score: f64, day: u32) -> UserScoreSnapshot {
        UserScoreSnapshot {
            snapshot_id: Uuid::new_v4(),
            date: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            producer: SnapshotProducer {
                name: "hdt-scoring".to_string(),
                version: "test".to_string(),
                instance_id: "test-instance".to_string(),
            },
            final_scores: FinalScores {
                health_literacy_score: HealthLiteracyScore {
                    domain: HealthLiteracyDomain {
                        name: "diabetes".to_string(),
                        score,
                        sources: HealthLiteracySources {
                            trivia: score,
                            game_session: score,
                        },
                    },
                },
                player_types_labels: ScoreVector::new(),
            },
            metrics_overviews: MetricsOverviews::default(),
            cursor: UserCursor::default(),
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("hdt-{name}-{}.json", Uuid::new_v4()))
    }

    #[test]
    fn test_append_and_latest() {
        let mut store = SnapshotStore::new();
        assert!(store.latest("42").is_none());
        assert!(store.history("42").is_empty());

        store.append("42", make_snapshot(0.1, 1));
        store.append("42", make_snapshot(0.2, 2));
        store.append("7", make_snapshot(0.9, 1));

        assert_eq!(store.history("42").len(), 2);
        let latest = store.latest("42").unwrap();
        assert_eq!(latest.final_scores.health_literacy_score.domain.score, 0.2);
        assert_eq!(store.user_ids().collect::<Vec<_>>(), vec!["42", "7"]);
    }

    #[test]
    fn test_json_round_trip() {
        let mut store = SnapshotStore::new();
        store.append("42", make_snapshot(0.3, 5));

        let json = store.to_json().unwrap();
        assert!(json.contains("\"users\""));
        assert!(json.contains("\"entries\""));

        let restored = SnapshotStore::from_json(&json).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = temp_path("store");
        let mut store = SnapshotStore::new();
        store.append("42", make_snapshot(0.4, 3));

        store.save(&path).unwrap();
        let loaded = SnapshotStore::load(&path).unwrap();
        assert_eq!(loaded, store);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let store = SnapshotStore::load(&temp_path("missing")).unwrap();
        assert_eq!(store, SnapshotStore::new());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let path = temp_path("corrupt");
        fs::write(&path, "{ not a store").unwrap();

        let err = SnapshotStore::load(&path).unwrap_err();
        assert!(matches!(err, ComputeError::StorageError(_)));

        fs::remove_file(&path).unwrap();
    }
}
