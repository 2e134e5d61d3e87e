//! Session summary assembly.
//!
//! Pure: takes the final world state plus loop counters and produces the
//! record handed to persistence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::parser::{ARROWS_DEATH_MARKER, PIT_DEATH_MARKER, WUMPUS_DEATH_MARKER};
use crate::core::types::SessionEnd;
use crate::core::world::WorldState;

/// One persisted record per session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub turns: u32,
    pub rooms_explored: usize,
    pub death_by_pit: bool,
    pub death_by_wumpus: bool,
    pub death_by_arrows: bool,
    pub game_won: bool,
    pub arrows_remaining: u32,
    pub oracle_errors: u32,
    pub read_timeouts: u32,
    pub average_decision_secs: f64,
    pub total_decision_secs: f64,
    pub ended_by: SessionEnd,
}

/// Loop-level counters that feed a summary.
#[derive(Debug, Clone)]
pub struct SummaryInput<'a> {
    pub session_id: &'a str,
    pub started_at: DateTime<Utc>,
    pub turns: u32,
    pub oracle_errors: u32,
    pub read_timeouts: u32,
    pub decision_times: &'a [Duration],
    pub ended_by: SessionEnd,
}

impl SessionSummary {
    pub fn assemble(state: &WorldState, input: &SummaryInput<'_>) -> Self {
        // Each cause is checked on its own; the game prints only one of them.
        let output = state.last_output.join(",").to_uppercase();
        let died_of = |marker: &str| state.game_over && output.contains(marker);

        let total: f64 = input
            .decision_times
            .iter()
            .map(Duration::as_secs_f64)
            .sum();
        let average = if input.decision_times.is_empty() {
            0.0
        } else {
            total / input.decision_times.len() as f64
        };

        Self {
            session_id: input.session_id.to_string(),
            started_at: input.started_at,
            turns: input.turns,
            rooms_explored: state.explored_rooms.len(),
            death_by_pit: died_of(PIT_DEATH_MARKER),
            death_by_wumpus: died_of(WUMPUS_DEATH_MARKER),
            death_by_arrows: died_of(ARROWS_DEATH_MARKER),
            game_won: state.win_state,
            arrows_remaining: state.arrows_left,
            oracle_errors: input.oracle_errors,
            read_timeouts: input.read_timeouts,
            average_decision_secs: average,
            total_decision_secs: total,
            ended_by: input.ended_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(decision_times: &[Duration], ended_by: SessionEnd) -> SummaryInput<'_> {
        SummaryInput {
            session_id: "session-1",
            started_at: Utc::now(),
            turns: 3,
            oracle_errors: 0,
            read_timeouts: 0,
            decision_times,
            ended_by,
        }
    }

    #[test]
    fn pit_death_is_read_from_final_output() {
        let mut state = WorldState::default();
        state.game_over = true;
        state.last_output = vec!["YYYIIIIEEEE . . . FELL IN PIT".to_string()];
        state.mark_explored(4);
        state.mark_explored(9);

        let summary = SessionSummary::assemble(&state, &input(&[], SessionEnd::Lost));
        assert!(summary.death_by_pit);
        assert!(!summary.death_by_wumpus);
        assert!(!summary.death_by_arrows);
        assert!(!summary.game_won);
        assert_eq!(summary.rooms_explored, 2);
        assert_eq!(summary.arrows_remaining, 5);
    }

    #[test]
    fn death_causes_require_game_over() {
        let mut state = WorldState::default();
        state.last_output = vec!["TSK TSK TSK - WUMPUS GOT YOU!".to_string()];

        let summary = SessionSummary::assemble(&state, &input(&[], SessionEnd::OracleFailed));
        assert!(!summary.death_by_wumpus);
    }

    #[test]
    fn latency_average_and_total() {
        let state = WorldState::default();
        let times = [Duration::from_millis(500), Duration::from_millis(1500)];

        let summary = SessionSummary::assemble(&state, &input(&times, SessionEnd::Won));
        assert_eq!(summary.total_decision_secs, 2.0);
        assert_eq!(summary.average_decision_secs, 1.0);
    }

    #[test]
    fn no_decisions_average_to_zero() {
        let summary =
            SessionSummary::assemble(&WorldState::default(), &input(&[], SessionEnd::StartFailed));
        assert_eq!(summary.average_decision_secs, 0.0);
        assert_eq!(summary.total_decision_secs, 0.0);
    }
}
