//! Glucose critical-response analysis
//!
//! Walks each session's glucose series and measures how quickly the player
//! responds to a critical (red band) reading: either by recovering into the
//! green band or, failing that, by the closest approach seen before the next
//! red reading or the end of the session.
//!
//! Band bounds are inclusive and overlap at their edges; a reading takes the
//! first band that contains it, checked in the order red, light red, yellow,
//! green.

use crate::types::GlucoseReading;
use tracing::debug;

/// Upper bound of the low red sub-band
const RED_LOW_MAX: f64 = 2.6;
/// Lower bound of the high red sub-band
const RED_HIGH_MIN: f64 = 15.0;

const RED: &[(f64, f64)] = &[(0.0, RED_LOW_MAX), (RED_HIGH_MIN, 20.0)];
const LIGHT_RED: &[(f64, f64)] = &[(2.6, 3.3), (11.0, 15.0)];
const YELLOW: &[(f64, f64)] = &[(3.3, 4.5), (8.0, 11.0)];
const GREEN: &[(f64, f64)] = &[(4.5, 8.0)];

/// Colored glucose region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlucoseBand {
    Red,
    LightRed,
    Yellow,
    Green,
}

impl GlucoseBand {
    /// Band containing `glucose`; readings outside every band yield `None`
    pub fn classify(glucose: f64) -> Option<Self> {
        let within = |ranges: &[(f64, f64)]| {
            ranges
                .iter()
                .any(|&(min, max)| min <= glucose && glucose <= max)
        };
        if within(RED) {
            Some(GlucoseBand::Red)
        } else if within(LIGHT_RED) {
            Some(GlucoseBand::LightRed)
        } else if within(YELLOW) {
            Some(GlucoseBand::Yellow)
        } else if within(GREEN) {
            Some(GlucoseBand::Green)
        } else {
            None
        }
    }
}

/// How an excursion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// A green reading followed the red anchor
    Recovered,
    /// No recovery; the closest non-green approach was used
    ClosestApproach,
}

/// Response to one red excursion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalResponseEvent {
    anchor: GlucoseReading,
    response: GlucoseReading,
    kind: ResponseKind,
}

impl CriticalResponseEvent {
    /// Returns `None` when both readings share a minute, since no rate exists
    pub fn new(
        anchor: GlucoseReading,
        response: GlucoseReading,
        kind: ResponseKind,
    ) -> Option<Self> {
        if response.minute == anchor.minute {
            return None;
        }
        Some(Self {
            anchor,
            response,
            kind,
        })
    }

    pub fn anchor(&self) -> GlucoseReading {
        self.anchor
    }

    pub fn response(&self) -> GlucoseReading {
        self.response
    }

    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Glucose change per minute between anchor and response
    pub fn rate(&self) -> f64 {
        (self.response.glucose - self.anchor.glucose).abs()
            / (self.response.minute - self.anchor.minute).abs()
    }
}

#[derive(Debug, Clone, Copy)]
enum State {
    Neutral,
    InRed {
        anchor: GlucoseReading,
        candidate: Option<GlucoseReading>,
    },
}

/// Whether `reading` is a more severe red than `anchor` on the anchor's side
fn is_worse_red(anchor: &GlucoseReading, reading: &GlucoseReading) -> bool {
    if anchor.glucose <= RED_LOW_MAX {
        reading.glucose < anchor.glucose
    } else if anchor.glucose >= RED_HIGH_MIN {
        reading.glucose > anchor.glucose
    } else {
        false
    }
}

/// Per-session critical-response state machine
pub struct GlucoseAnalyzer;

impl GlucoseAnalyzer {
    /// Critical-response events of one session, in order
    pub fn analyze(series: &[GlucoseReading]) -> Vec<CriticalResponseEvent> {
        let mut events = Vec::new();
        let mut state = State::Neutral;

        let mut emit = |anchor: GlucoseReading, response: GlucoseReading, kind: ResponseKind| {
            match CriticalResponseEvent::new(anchor, response, kind) {
                Some(event) => events.push(event),
                None => debug!(
                    minute = anchor.minute,
                    "dropping critical response with zero time delta"
                ),
            }
        };

        for reading in series {
            let Some(band) = GlucoseBand::classify(reading.glucose) else {
                debug!(glucose = reading.glucose, "glucose reading outside every band");
                continue;
            };

            state = match (state, band) {
                (State::Neutral, GlucoseBand::Red) => State::InRed {
                    anchor: *reading,
                    candidate: None,
                },
                (State::Neutral, _) => State::Neutral,
                (State::InRed { anchor, candidate }, GlucoseBand::Red) => match candidate {
                    Some(candidate) => {
                        emit(anchor, candidate, ResponseKind::ClosestApproach);
                        State::InRed {
                            anchor: *reading,
                            candidate: None,
                        }
                    }
                    None if is_worse_red(&anchor, reading) => State::InRed {
                        anchor: *reading,
                        candidate: None,
                    },
                    None => State::InRed { anchor, candidate },
                },
                (State::InRed { anchor, .. }, GlucoseBand::Green) => {
                    emit(anchor, *reading, ResponseKind::Recovered);
                    State::Neutral
                }
                (
                    State::InRed { anchor, candidate },
                    GlucoseBand::LightRed | GlucoseBand::Yellow,
                ) => {
                    let candidate = match candidate {
                        Some(held)
                            if (held.glucose - anchor.glucose).abs()
                                <= (reading.glucose - anchor.glucose).abs() =>
                        {
                            held
                        }
                        _ => *reading,
                    };
                    State::InRed {
                        anchor,
                        candidate: Some(candidate),
                    }
                }
            };
        }

        match state {
            State::InRed {
                anchor,
                candidate: Some(candidate),
            } => emit(anchor, candidate, ResponseKind::ClosestApproach),
            State::InRed { anchor, .. } => debug!(
                glucose = anchor.glucose,
                "discarding excursion without recovery"
            ),
            State::Neutral => {}
        }

        events
    }

    /// Critical-response rates over every session, each session analyzed from a fresh state
    pub fn response_rates(sessions: &[Vec<GlucoseReading>]) -> Vec<f64> {
        sessions
            .iter()
            .flat_map(|series| Self::analyze(series))
            .map(|event| event.rate())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn series(points: &[(f64, f64)]) -> Vec<GlucoseReading> {
        points
            .iter()
            .map(|&(glucose, minute)| GlucoseReading::new(glucose, minute))
            .collect()
    }

    #[test]
    fn test_band_classification() {
        assert_eq!(GlucoseBand::classify(1.0), Some(GlucoseBand::Red));
        assert_eq!(GlucoseBand::classify(2.6), Some(GlucoseBand::Red));
        assert_eq!(GlucoseBand::classify(3.0), Some(GlucoseBand::LightRed));
        assert_eq!(GlucoseBand::classify(4.0), Some(GlucoseBand::Yellow));
        assert_eq!(GlucoseBand::classify(4.5), Some(GlucoseBand::Yellow));
        assert_eq!(GlucoseBand::classify(6.0), Some(GlucoseBand::Green));
        assert_eq!(GlucoseBand::classify(8.0), Some(GlucoseBand::Yellow));
        assert_eq!(GlucoseBand::classify(12.0), Some(GlucoseBand::LightRed));
        assert_eq!(GlucoseBand::classify(15.0), Some(GlucoseBand::Red));
        assert_eq!(GlucoseBand::classify(25.0), None);
        assert_eq!(GlucoseBand::classify(-1.0), None);
    }

    #[test]
    fn test_recovery_event() {
        let events = GlucoseAnalyzer::analyze(&series(&[(2.0, 0.0), (6.0, 10.0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), ResponseKind::Recovered);
        assert!((events[0].rate() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_anchor_kept_when_new_red_not_worse() {
        let events = GlucoseAnalyzer::analyze(&series(&[(1.0, 0.0), (1.5, 5.0), (6.0, 12.0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].anchor(), GlucoseReading::new(1.0, 0.0));
        assert!((events[0].rate() - 5.0 / 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_anchor_replaced_by_worse_red() {
        let events = GlucoseAnalyzer::analyze(&series(&[(16.0, 0.0), (18.0, 5.0), (7.0, 15.0)]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].anchor(), GlucoseReading::new(18.0, 5.0));
        assert!((events[0].rate() - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_unrecovered_opposite_reds_emit_nothing() {
        let events = GlucoseAnalyzer::analyze(&series(&[(1.0, 0.0), (16.0, 5.0)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_empty_and_single_point_series() {
        assert!(GlucoseAnalyzer::analyze(&[]).is_empty());
        assert!(GlucoseAnalyzer::analyze(&series(&[(1.0, 0.0)])).is_empty());
    }

    #[test]
    fn test_candidate_flushed_on_new_red() {
        // 3.0 is held as the candidate, then a new red opens a second excursion
        let events = GlucoseAnalyzer::analyze(&series(&[
            (2.0, 0.0),
            (3.0, 5.0),
            (1.0, 10.0),
            (5.0, 20.0),
        ]));
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind(), ResponseKind::ClosestApproach);
        assert!((events[0].rate() - 0.2).abs() < 1e-12);
        assert_eq!(events[1].kind(), ResponseKind::Recovered);
        assert!((events[1].rate() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_candidate_closest_to_anchor_is_held() {
        let events = GlucoseAnalyzer::analyze(&series(&[
            (16.0, 0.0),
            (9.0, 10.0),
            (12.0, 20.0),
            (10.0, 30.0),
        ]));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].response(), GlucoseReading::new(12.0, 20.0));
        assert!((events[0].rate() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_state_does_not_leak_across_sessions() {
        let sessions = vec![series(&[(2.0, 0.0)]), series(&[(6.0, 10.0)])];
        assert!(GlucoseAnalyzer::response_rates(&sessions).is_empty());
    }

    #[test]
    fn test_zero_time_delta_is_dropped() {
        let events = GlucoseAnalyzer::analyze(&series(&[(2.0, 5.0), (6.0, 5.0)]));
        assert!(events.is_empty());
    }
}
