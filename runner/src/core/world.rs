//! Authoritative world state and the rules for merging parsed updates into it.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::parser::PartialUpdate;
use crate::core::types::Terminal;

/// Arrows the reference game hands out at the start.
pub const DEFAULT_ARROWS: u32 = 5;

/// Mutable snapshot of everything known about the running game.
///
/// Owned by the turn controller; everyone else sees clones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorldState {
    /// Last confirmed room. `None` until the first location report.
    pub current_room: Option<u32>,
    /// Rooms reachable from `current_room`, as last reported.
    pub adjacent_rooms: Vec<u32>,
    /// Rooms the controller has moved into. Never shrinks.
    pub explored_rooms: BTreeSet<u32>,
    pub bat_nearby: bool,
    pub draft_felt: bool,
    pub wumpus_smell: bool,
    pub arrows_left: u32,
    pub game_over: bool,
    pub win_state: bool,
    /// Output of the most recent cycle, one trimmed entry per line.
    pub last_output: Vec<String>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(DEFAULT_ARROWS)
    }
}

impl WorldState {
    pub fn new(arrows: u32) -> Self {
        Self {
            current_room: None,
            adjacent_rooms: Vec::new(),
            explored_rooms: BTreeSet::new(),
            bat_nearby: false,
            draft_felt: false,
            wumpus_smell: false,
            arrows_left: arrows,
            game_over: false,
            win_state: false,
            last_output: Vec::new(),
        }
    }

    /// Clear per-cycle hazard flags. Called before every merge.
    pub fn reset_hazards(&mut self) {
        self.bat_nearby = false;
        self.draft_felt = false;
        self.wumpus_smell = false;
    }

    /// Merge one parsed batch.
    ///
    /// Location and adjacency overwrite; hazards only ever turn on (they were
    /// reset by the caller); a terminal signal is sticky once set.
    pub fn apply(&mut self, update: PartialUpdate) {
        self.last_output = update.lines;
        if let Some(room) = update.current_room {
            self.current_room = Some(room);
        }
        if let Some(rooms) = update.adjacent_rooms {
            self.adjacent_rooms = rooms;
        }
        self.bat_nearby |= update.bat_nearby;
        self.draft_felt |= update.draft_felt;
        self.wumpus_smell |= update.wumpus_smell;
        if let Some(terminal) = update.terminal
            && !self.game_over
        {
            self.game_over = true;
            self.win_state = terminal == Terminal::Victory;
        }
    }

    /// Record entry into `room`.
    pub fn mark_explored(&mut self, room: u32) {
        self.explored_rooms.insert(room);
    }

    /// Spend one arrow, never going below zero.
    pub fn spend_arrow(&mut self) {
        self.arrows_left = self.arrows_left.saturating_sub(1);
    }

    /// Adjacent rooms not yet entered, in report order.
    pub fn unexplored_adjacent(&self) -> Vec<u32> {
        self.adjacent_rooms
            .iter()
            .copied()
            .filter(|room| !self.explored_rooms.contains(room))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parser::parse_lines;
    use crate::core::types::DeathCause;

    fn cycle(state: &mut WorldState, lines: &[&str]) {
        state.reset_hazards();
        state.apply(parse_lines(lines));
    }

    #[test]
    fn smell_and_bats_batch_yields_full_state() {
        let mut state = WorldState::default();
        cycle(
            &mut state,
            &[
                "YOU ARE IN ROOM 6",
                "TUNNELS LEAD TO 5 7 15",
                "I SMELL A WUMPUS!",
                "BATS NEARBY!",
            ],
        );

        assert_eq!(state.current_room, Some(6));
        assert_eq!(state.adjacent_rooms, vec![5, 7, 15]);
        assert!(state.wumpus_smell);
        assert!(state.bat_nearby);
        assert!(!state.draft_felt);
        assert!(!state.game_over);
    }

    #[test]
    fn hazards_do_not_survive_a_silent_cycle() {
        let mut state = WorldState::default();
        cycle(&mut state, &["I SMELL A WUMPUS!", "BATS NEARBY!", "I FEEL A DRAFT"]);
        assert!(state.wumpus_smell && state.bat_nearby && state.draft_felt);

        cycle(&mut state, &["WHERE TO"]);
        assert!(!state.wumpus_smell);
        assert!(!state.bat_nearby);
        assert!(!state.draft_felt);
    }

    #[test]
    fn adjacency_is_replaced_not_merged() {
        let mut state = WorldState::default();
        cycle(&mut state, &["YOU ARE IN ROOM 1", "TUNNELS LEAD TO 2 5 8"]);
        cycle(&mut state, &["YOU ARE IN ROOM 2", "TUNNELS LEAD TO 1 3 10"]);
        assert_eq!(state.current_room, Some(2));
        assert_eq!(state.adjacent_rooms, vec![1, 3, 10]);
    }

    #[test]
    fn room_is_kept_when_batch_has_no_location() {
        let mut state = WorldState::default();
        cycle(&mut state, &["YOU ARE IN ROOM 7", "TUNNELS LEAD TO 6 8 17"]);
        cycle(&mut state, &["MISSED"]);
        assert_eq!(state.current_room, Some(7));
        assert_eq!(state.last_output, vec!["MISSED"]);
    }

    #[test]
    fn first_terminal_signal_is_sticky() {
        let mut state = WorldState::default();
        cycle(&mut state, &["TSK TSK TSK - WUMPUS GOT YOU!"]);
        assert!(state.game_over);
        assert!(!state.win_state);

        state.apply(PartialUpdate {
            terminal: Some(Terminal::Victory),
            ..PartialUpdate::default()
        });
        assert!(!state.win_state);

        state.apply(PartialUpdate {
            terminal: Some(Terminal::Defeat(DeathCause::Pit)),
            ..PartialUpdate::default()
        });
        assert!(state.game_over);
    }

    #[test]
    fn arrows_clamp_at_zero() {
        let mut state = WorldState::new(1);
        state.spend_arrow();
        state.spend_arrow();
        assert_eq!(state.arrows_left, 0);
    }

    #[test]
    fn unexplored_adjacent_skips_entered_rooms() {
        let mut state = WorldState::default();
        cycle(&mut state, &["YOU ARE IN ROOM 1", "TUNNELS LEAD TO 2 5 8"]);
        state.mark_explored(5);
        assert_eq!(state.unexplored_adjacent(), vec![2, 8]);
    }
}
