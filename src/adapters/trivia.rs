//! Diabetes trivia adapter
//!
//! Each trivia record is one answered question. Whether a hint was used, the
//! question's difficulty and the correctness of the answer accumulate into
//! [`TriviaCounts`].

use crate::schema::{ActivityRecord, PropertyKey};
use crate::types::{DataSource, TriviaCounts};

use super::{coerce_bool, coerce_int, read_property, MissingFieldReport, SourceAdapter};

/// Three-point Likert difficulty of a trivia question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    fn from_likert(value: &serde_json::Value) -> Result<Self, String> {
        match coerce_int(value)? {
            -1 => Ok(Difficulty::Easy),
            0 => Ok(Difficulty::Normal),
            1 => Ok(Difficulty::Hard),
            other => Err(format!("{other} is not a difficulty level")),
        }
    }
}

/// Trivia answer adapter
pub struct TriviaAdapter;

impl SourceAdapter for TriviaAdapter {
    type Metrics = TriviaCounts;

    fn source(&self) -> DataSource {
        DataSource::Trivia
    }

    fn extract_record(
        &self,
        record: &ActivityRecord,
        counts: &mut TriviaCounts,
        report: &mut MissingFieldReport,
    ) {
        let source = self.source();

        let through_hint =
            read_property(record, source, PropertyKey::ThroughHint, report, coerce_bool);
        match through_hint {
            Some(true) => counts.with_hint += 1,
            Some(false) => counts.without_hint += 1,
            None => {}
        }

        match read_property(
            record,
            source,
            PropertyKey::DifficultyLikert3,
            report,
            Difficulty::from_likert,
        ) {
            Some(Difficulty::Easy) => counts.easy += 1,
            Some(Difficulty::Normal) => counts.normal += 1,
            Some(Difficulty::Hard) => counts.hard += 1,
            None => {}
        }

        let correct =
            read_property(record, source, PropertyKey::QuestionCorrect, report, coerce_bool);
        // Correctness only counts for answers given without a hint
        if through_hint == Some(false) {
            match correct {
                Some(true) => counts.correct += 1,
                Some(false) => counts.incorrect += 1,
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::make_record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn answer(id: u64, hint: &str, difficulty: &str, correct: &str) -> ActivityRecord {
        make_record(
            id,
            &[
                ("DIFFICULTY_LIKERT_3", json!(difficulty)),
                ("QUESTION_CORRECT", json!(correct)),
                ("THROUGH_HINT", json!(hint)),
            ],
        )
    }

    #[test]
    fn test_counts_answers() {
        let records = vec![
            answer(1, "false", "-1", "true"),
            answer(2, "false", "0", "false"),
            answer(3, "true", "1", "true"),
            answer(4, "false", "1", "true"),
        ];

        let extraction = TriviaAdapter.extract(&records, 0);
        assert_eq!(
            extraction.metrics,
            TriviaCounts {
                with_hint: 1,
                without_hint: 3,
                easy: 1,
                normal: 1,
                hard: 2,
                correct: 2,
                incorrect: 1,
            }
        );
        assert!(extraction.report.is_empty());
    }

    #[test]
    fn test_unknown_hint_does_not_count_correctness() {
        let records = vec![
            make_record(1, &[("QUESTION_CORRECT", json!("true"))]),
            answer(2, "maybe", "5", "true"),
        ];

        let extraction = TriviaAdapter.extract(&records, 0);
        assert_eq!(extraction.metrics, TriviaCounts::default());
        // record 1: hint and difficulty absent; record 2: hint and difficulty undecodable
        assert_eq!(extraction.report.len(), 4);
        assert_eq!(extraction.report.undecodable().count(), 2);
    }
}
