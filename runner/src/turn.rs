//! Turn controller: the state machine that couples game I/O with world state.
//!
//! Every command line sent to the game is followed by one output cycle:
//! read until the prompt, reset hazards, parse, merge, and tear the game down
//! once a terminal signal is seen. Multi-step commands (move, attack) run a
//! cycle per step because the game prompts between steps; once a cycle turns
//! terminal the remaining steps are not sent.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::parser::parse_output;
use crate::core::types::{Action, ActionKind};
use crate::core::world::{DEFAULT_ARROWS, WorldState};
use crate::io::channel::{ChannelError, GameChannel};

/// Answer to the game's opening "instructions?" question.
pub const CONFIRM_COMMAND: &str = "N";
pub const MOVE_COMMAND: &str = "M";
pub const SHOOT_COMMAND: &str = "S";
/// Rooms an arrow travels through unless told otherwise.
pub const DEFAULT_CHARGE: u32 = 1;

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingOutput,
    Updated,
    TerminalReached,
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("game is over; no further commands accepted")]
    GameOver,
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Timing and resource settings for one game.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub read_timeout: Duration,
    pub teardown_grace: Duration,
    pub initial_arrows: u32,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            teardown_grace: Duration::from_secs(5),
            initial_arrows: DEFAULT_ARROWS,
        }
    }
}

/// Exclusive owner of the game channel and its world state.
pub struct TurnController<C: GameChannel> {
    channel: C,
    state: WorldState,
    phase: Phase,
    settings: TurnSettings,
    torn_down: bool,
    process_exited: bool,
    terminal_seen: bool,
    read_timeouts: u32,
}

impl<C: GameChannel> TurnController<C> {
    /// Spawn the game, answer its opening question and seed the world state.
    #[instrument(skip_all)]
    pub fn initialize<F>(spawn: F, settings: TurnSettings) -> Result<Self, TurnError>
    where
        F: FnOnce() -> Result<C, ChannelError>,
    {
        let channel = spawn()?;
        let mut controller = Self {
            channel,
            state: WorldState::new(settings.initial_arrows),
            phase: Phase::Idle,
            settings,
            torn_down: false,
            process_exited: false,
            terminal_seen: false,
            read_timeouts: 0,
        };
        // Banner up to the first prompt. A game that is already over keeps its
        // parsed state for the session to classify.
        controller.output_cycle();
        if !controller.state.game_over && !controller.process_exited {
            controller.step(CONFIRM_COMMAND)?;
        }
        info!(room = ?controller.state.current_room, adjacent = ?controller.state.adjacent_rooms, "game started");
        Ok(controller)
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Owned copy of the current state for the oracle and turn results.
    pub fn snapshot(&self) -> WorldState {
        self.state.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn read_timeouts(&self) -> u32 {
        self.read_timeouts
    }

    /// Whether the game process died before reporting a terminal condition.
    pub fn process_exited(&self) -> bool {
        self.process_exited
    }

    /// Whether the game printed a win or loss marker.
    pub fn terminal_seen(&self) -> bool {
        self.terminal_seen
    }

    /// Liveness as seen by the session loop.
    pub fn is_alive(&mut self) -> bool {
        !self.torn_down && !self.process_exited && self.channel.is_alive()
    }

    /// Dispatch an oracle action.
    pub fn execute(&mut self, action: &Action) -> Result<(), TurnError> {
        match action.kind {
            ActionKind::Move => self.execute_move(action.room),
            ActionKind::Attack => self.execute_attack(action.room, DEFAULT_CHARGE),
        }
    }

    /// Move into `room`. The room counts as explored once it was sent,
    /// whether or not the following output reports it.
    #[instrument(skip(self))]
    pub fn execute_move(&mut self, room: u32) -> Result<(), TurnError> {
        self.step(MOVE_COMMAND)?;
        if self.state.game_over {
            return Ok(());
        }
        self.step(&room.to_string())?;
        self.state.mark_explored(room);
        info!(room = ?self.state.current_room, hazards = ?self.hazards(), "move completed");
        Ok(())
    }

    /// Shoot an arrow through `charge` rooms ending at `room`. One arrow is
    /// spent as soon as the shot is dispatched, even if the game ends before
    /// the target is asked for.
    #[instrument(skip(self))]
    pub fn execute_attack(&mut self, room: u32, charge: u32) -> Result<(), TurnError> {
        self.step(SHOOT_COMMAND)?;
        self.state.spend_arrow();
        if self.state.game_over {
            return Ok(());
        }
        self.step(&charge.to_string())?;
        if self.state.game_over {
            return Ok(());
        }
        self.step(&room.to_string())?;
        info!(arrows_left = self.state.arrows_left, game_over = self.state.game_over, "shot completed");
        Ok(())
    }

    /// Stop the game process. Runs at most once; later calls are no-ops.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("tearing down game process");
        self.channel.terminate(self.settings.teardown_grace);
        if self.state.game_over {
            self.phase = Phase::TerminalReached;
        }
    }

    fn step(&mut self, line: &str) -> Result<(), TurnError> {
        if self.state.game_over {
            return Err(TurnError::GameOver);
        }
        self.channel.send_line(line)?;
        self.output_cycle();
        Ok(())
    }

    fn output_cycle(&mut self) {
        self.phase = Phase::AwaitingOutput;
        let read = self.channel.read_until_prompt(self.settings.read_timeout);
        if read.timed_out {
            self.read_timeouts += 1;
            warn!(buffered = read.text.len(), "proceeding with partial game output");
        }
        if read.ended && !self.process_exited {
            self.process_exited = true;
            warn!("game process ended during output cycle");
        }

        let update = parse_output(&read.text);
        debug!(lines = update.lines.len(), "processed game output");
        self.terminal_seen |= update.terminal.is_some();
        self.state.reset_hazards();
        self.state.apply(update);
        self.phase = Phase::Updated;

        if self.state.game_over {
            info!(won = self.state.win_state, "terminal condition reached");
            self.teardown();
            self.phase = Phase::TerminalReached;
        } else {
            self.phase = Phase::Idle;
        }
    }

    fn hazards(&self) -> [bool; 3] {
        [
            self.state.bat_nearby,
            self.state.draft_felt,
            self.state.wumpus_smell,
        ]
    }
}

impl<C: GameChannel> Drop for TurnController<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::channel::ReadOutcome;
    use crate::test_support::{ScriptedChannel, prompt, timeout};

    fn controller(script: Vec<ReadOutcome>) -> (TurnController<ScriptedChannel>, ScriptedChannel) {
        let channel = ScriptedChannel::new(script);
        let handle = channel.clone();
        let controller =
            TurnController::initialize(move || Ok(channel), TurnSettings::default()).expect("init");
        (controller, handle)
    }

    fn opening() -> Vec<ReadOutcome> {
        vec![
            prompt("HUNT THE WUMPUS\nINSTRUCTIONS (Y-N)"),
            prompt("YOU ARE IN ROOM 1\nTUNNELS LEAD TO 2 5 8\n\nSHOOT OR MOVE (S-M)"),
        ]
    }

    #[test]
    fn initialize_confirms_and_seeds_state() {
        let (controller, handle) = controller(opening());

        assert_eq!(handle.sent(), vec!["N"]);
        assert_eq!(controller.state().current_room, Some(1));
        assert_eq!(controller.state().adjacent_rooms, vec![2, 5, 8]);
        assert!(controller.state().explored_rooms.is_empty());
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn move_sends_selector_then_room_and_marks_explored() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(prompt("I FEEL A DRAFT\nYOU ARE IN ROOM 5\nTUNNELS LEAD TO 1 4 6\n\nSHOOT OR MOVE (S-M)"));
        let (mut controller, handle) = controller(script);

        controller.execute_move(5).expect("move");

        assert_eq!(handle.sent(), vec!["N", "M", "5"]);
        assert_eq!(controller.state().current_room, Some(5));
        assert_eq!(controller.state().adjacent_rooms, vec![1, 4, 6]);
        assert!(controller.state().draft_felt);
        assert!(controller.state().explored_rooms.contains(&5));
    }

    #[test]
    fn move_marks_explored_even_when_location_is_missing() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(prompt("GARBLED OUTPUT"));
        let (mut controller, _handle) = controller(script);

        controller.execute_move(8).expect("move");

        assert_eq!(controller.state().current_room, Some(1));
        assert!(controller.state().explored_rooms.contains(&8));
    }

    #[test]
    fn hazards_reset_on_every_cycle() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(prompt("BATS NEARBY!\nYOU ARE IN ROOM 2\nTUNNELS LEAD TO 1 3 10"));
        script.push(prompt("WHERE TO"));
        script.push(prompt("YOU ARE IN ROOM 3\nTUNNELS LEAD TO 2 4 12"));
        let (mut controller, _handle) = controller(script);

        controller.execute_move(2).expect("move");
        assert!(controller.state().bat_nearby);
        controller.execute_move(3).expect("move");
        assert!(!controller.state().bat_nearby);
    }

    #[test]
    fn attack_sends_three_steps_and_spends_one_arrow() {
        let mut script = opening();
        script.push(prompt("NO. OF ROOMS (1-5)"));
        script.push(prompt("ROOM #"));
        script.push(prompt("MISSED\nYOU ARE IN ROOM 1\nTUNNELS LEAD TO 2 5 8\nSHOOT OR MOVE (S-M)"));
        let (mut controller, handle) = controller(script);

        controller.execute_attack(5, 1).expect("attack");

        assert_eq!(handle.sent(), vec!["N", "S", "1", "5"]);
        assert_eq!(controller.state().arrows_left, 4);
        assert!(!controller.state().game_over);
    }

    /// Verifies a shot spends its arrow even when the game ends on the selector.
    ///
    /// The last arrow runs out as soon as `S` is answered, so neither the
    /// charge nor the target is sent.
    #[test]
    fn attack_ended_after_selector_still_spends_arrow() {
        let mut script = opening();
        script.push(prompt("YOU RAN OUT OF ARROWS\nHA HA HA - YOU LOSE!"));
        let (mut controller, handle) = controller(script);

        controller.execute_attack(4, 1).expect("attack");

        assert_eq!(handle.sent(), vec!["N", "S"]);
        assert_eq!(controller.state().arrows_left, 4);
        assert!(controller.state().game_over);
        assert!(!controller.state().win_state);
    }

    #[test]
    fn attack_with_no_arrows_stays_at_zero() {
        let mut script = opening();
        script.push(prompt("NO. OF ROOMS (1-5)"));
        script.push(prompt("ROOM #"));
        script.push(prompt("MISSED\nSHOOT OR MOVE (S-M)"));
        let channel = ScriptedChannel::new(script);
        let settings = TurnSettings {
            initial_arrows: 0,
            ..TurnSettings::default()
        };
        let mut controller =
            TurnController::initialize(move || Ok(channel), settings).expect("init");

        controller.execute_attack(2, 1).expect("attack");

        assert_eq!(controller.state().arrows_left, 0);
    }

    /// Verifies a game that ends during the banner keeps its parsed state.
    #[test]
    fn terminal_in_banner_skips_confirmation() {
        let (controller, handle) = controller(vec![prompt(
            "HUNT THE WUMPUS\nYYYIIIIEEEE . . . FELL IN PIT\nHA HA HA - YOU LOSE!",
        )]);

        assert!(handle.sent().is_empty());
        assert!(controller.state().game_over);
        assert!(!controller.state().win_state);
        assert!(controller.terminal_seen());
        assert_eq!(handle.terminate_calls(), 1);
    }

    #[test]
    fn victory_tears_down_exactly_once() {
        let mut script = opening();
        script.push(prompt("NO. OF ROOMS (1-5)"));
        script.push(prompt("ROOM #"));
        script.push(prompt("AHA! YOU GOT THE WUMPUS!\nHEE HEE HEE - THE WUMPUS'LL GETCHA NEXT TIME!!"));
        let (mut controller, handle) = controller(script);

        controller
            .execute(&Action {
                kind: ActionKind::Attack,
                room: 5,
                reasoning: "smelled it next door".to_string(),
            })
            .expect("attack");

        assert!(controller.state().game_over);
        assert!(controller.state().win_state);
        assert_eq!(controller.state().arrows_left, 4);
        assert_eq!(controller.phase(), Phase::TerminalReached);
        assert_eq!(handle.terminate_calls(), 1);

        controller.teardown();
        drop(controller);
        assert_eq!(handle.terminate_calls(), 1);
    }

    #[test]
    fn no_commands_after_game_over() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(prompt("YYYIIIIEEEE . . . FELL IN PIT"));
        let (mut controller, handle) = controller(script);

        controller.execute_move(8).expect("move");
        assert!(controller.state().game_over);
        assert!(!controller.state().win_state);

        let err = controller.execute_move(2).unwrap_err();
        assert!(matches!(err, TurnError::GameOver));
        assert_eq!(handle.sent(), vec!["N", "M", "8"]);
    }

    #[test]
    fn terminal_mid_sequence_skips_remaining_steps() {
        let mut script = opening();
        script.push(prompt("TSK TSK TSK - WUMPUS GOT YOU!"));
        let (mut controller, handle) = controller(script);

        controller.execute_move(2).expect("move");

        assert_eq!(handle.sent(), vec!["N", "M"]);
        assert!(!controller.state().explored_rooms.contains(&2));
        assert!(controller.state().game_over);
    }

    #[test]
    fn read_timeout_is_not_a_failure() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(timeout("YOU ARE IN ROOM 2"));
        let (mut controller, _handle) = controller(script);

        controller.execute_move(2).expect("move survives timeout");

        assert!(!controller.state().game_over);
        assert_eq!(controller.state().current_room, Some(2));
        assert_eq!(controller.read_timeouts(), 1);
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[test]
    fn process_death_is_recorded_without_error() {
        let mut script = opening();
        script.push(prompt("WHERE TO"));
        script.push(ReadOutcome {
            text: "SEGMENTATION FAULT".to_string(),
            timed_out: false,
            ended: true,
        });
        let (mut controller, handle) = controller(script);

        controller.execute_move(2).expect("move");

        assert!(controller.process_exited());
        assert!(!controller.terminal_seen());
        assert!(!controller.is_alive());
        assert!(!controller.state().game_over);
        assert_eq!(handle.terminate_calls(), 0);
    }

    #[test]
    fn spawn_failure_is_reported() {
        let result = TurnController::<ScriptedChannel>::initialize(
            || Err(ChannelError::EmptyCommand),
            TurnSettings::default(),
        );
        assert!(matches!(result, Err(TurnError::Channel(ChannelError::EmptyCommand))));
    }
}
