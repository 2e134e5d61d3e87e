//! Shared deterministic types for the game loop.
//!
//! These types define stable contracts between the oracle boundary, the turn
//! controller and persistence. They carry no I/O and serialize deterministically.

use serde::{Deserialize, Serialize};

/// Kind of action the oracle may choose.
///
/// The vocabulary is closed: anything else fails to decode at the oracle
/// boundary and never reaches the turn controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Walk into an adjacent room.
    Move,
    /// Fire an arrow into a room.
    #[serde(alias = "shoot")]
    Attack,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Move => "move",
            ActionKind::Attack => "attack",
        }
    }
}

/// One decision returned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    pub room: u32,
    /// Free-text rationale, bounded to 10..=200 characters by the action schema.
    pub reasoning: String,
}

/// How a game ended, as reported by the game's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Victory,
    Defeat(DeathCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    Pit,
    Wumpus,
    OutOfArrows,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    /// The game reported a victory.
    Won,
    /// The game reported a defeat.
    Lost,
    /// The oracle failed to produce an action.
    OracleFailed,
    /// The game process exited without a terminal marker.
    ProcessExited,
    /// The abort handle was triggered.
    Aborted,
    /// `max_turns` was reached before the game ended.
    TurnLimit,
    /// The game process could not be started.
    StartFailed,
    /// Writing a command to the game failed mid-turn.
    GameIoFailed,
}

impl SessionEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionEnd::Won => "won",
            SessionEnd::Lost => "lost",
            SessionEnd::OracleFailed => "oracle_failed",
            SessionEnd::ProcessExited => "process_exited",
            SessionEnd::Aborted => "aborted",
            SessionEnd::TurnLimit => "turn_limit",
            SessionEnd::StartFailed => "start_failed",
            SessionEnd::GameIoFailed => "game_io_failed",
        }
    }

    /// Whether the game itself reached a terminal condition.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionEnd::Won | SessionEnd::Lost)
    }
}
