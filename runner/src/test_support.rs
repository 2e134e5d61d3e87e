//! Test-only doubles for the game channel, oracle and metrics store.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::Utc;

use crate::core::summary::SessionSummary;
use crate::core::types::{Action, ActionKind, SessionEnd};
use crate::core::world::WorldState;
use crate::io::channel::{ChannelError, GameChannel, ReadOutcome};
use crate::io::metrics::MetricsStore;
use crate::io::oracle::Oracle;

#[derive(Debug, Default)]
struct ChannelLog {
    script: VecDeque<ReadOutcome>,
    sent: Vec<String>,
    terminate_calls: u32,
    ended: bool,
}

/// Game channel that replays canned reads and records what was sent.
///
/// Clones share the same log, so a test can keep a handle after moving the
/// channel into a controller.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChannel {
    log: Rc<RefCell<ChannelLog>>,
}

impl ScriptedChannel {
    pub fn new(script: Vec<ReadOutcome>) -> Self {
        Self {
            log: Rc::new(RefCell::new(ChannelLog {
                script: script.into(),
                ..ChannelLog::default()
            })),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.log.borrow().sent.clone()
    }

    pub fn terminate_calls(&self) -> u32 {
        self.log.borrow().terminate_calls
    }

    /// Reads still queued.
    pub fn remaining(&self) -> usize {
        self.log.borrow().script.len()
    }
}

impl GameChannel for ScriptedChannel {
    fn send_line(&mut self, line: &str) -> Result<(), ChannelError> {
        let mut log = self.log.borrow_mut();
        if log.ended || log.terminate_calls > 0 {
            return Err(ChannelError::Exited);
        }
        log.sent.push(line.to_string());
        Ok(())
    }

    fn read_until_prompt(&mut self, _timeout: Duration) -> ReadOutcome {
        let mut log = self.log.borrow_mut();
        // An exhausted script behaves like a game that quit.
        let outcome = log.script.pop_front().unwrap_or_else(|| exited(""));
        if outcome.ended {
            log.ended = true;
        }
        outcome
    }

    fn is_alive(&mut self) -> bool {
        let log = self.log.borrow();
        !log.ended && log.terminate_calls == 0
    }

    fn terminate(&mut self, _grace: Duration) {
        self.log.borrow_mut().terminate_calls += 1;
    }
}

/// Output that ends at a prompt.
pub fn prompt(text: &str) -> ReadOutcome {
    ReadOutcome {
        text: text.to_string(),
        timed_out: false,
        ended: false,
    }
}

/// Output cut short by the read timeout.
pub fn timeout(text: &str) -> ReadOutcome {
    ReadOutcome {
        text: text.to_string(),
        timed_out: true,
        ended: false,
    }
}

/// Output followed by the game process exiting.
pub fn exited(text: &str) -> ReadOutcome {
    ReadOutcome {
        text: text.to_string(),
        timed_out: false,
        ended: true,
    }
}

/// Banner and first room report, as seen by `TurnController::initialize`.
pub fn opening(room: u32, tunnels: [u32; 3]) -> Vec<ReadOutcome> {
    vec![
        prompt("HUNT THE WUMPUS\nINSTRUCTIONS (Y-N)"),
        prompt(&format!(
            "YOU ARE IN ROOM {room}\nTUNNELS LEAD TO {} {} {}\n\nSHOOT OR MOVE (S-M)",
            tunnels[0], tunnels[1], tunnels[2]
        )),
    ]
}

/// Reads for one move: the room question, then `output`.
pub fn move_cycle(output: &str) -> Vec<ReadOutcome> {
    vec![prompt("WHERE TO"), prompt(output)]
}

/// Reads for one single-room shot: the two questions, then `output`.
pub fn attack_cycle(output: &str) -> Vec<ReadOutcome> {
    vec![prompt("NO. OF ROOMS (1-5)"), prompt("ROOM #"), prompt(output)]
}

pub fn move_to(room: u32) -> Action {
    Action {
        kind: ActionKind::Move,
        room,
        reasoning: format!("room {room} looks safe to explore"),
    }
}

pub fn attack(room: u32) -> Action {
    Action {
        kind: ActionKind::Attack,
        room,
        reasoning: format!("the wumpus is likely in room {room}"),
    }
}

/// Oracle that returns scripted decisions in order.
///
/// `Err` entries become oracle failures. An exhausted script fails too.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: RefCell<VecDeque<Result<Action, String>>>,
    seen: RefCell<Vec<WorldState>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Result<Action, String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            seen: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.borrow().len()
    }

    /// Snapshots the oracle was asked about, in order.
    pub fn seen(&self) -> Vec<WorldState> {
        self.seen.borrow().clone()
    }
}

impl Oracle for ScriptedOracle {
    fn choose_action(&self, state: &WorldState) -> Result<Action> {
        self.seen.borrow_mut().push(state.clone());
        match self.script.borrow_mut().pop_front() {
            Some(Ok(action)) => Ok(action),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted oracle exhausted")),
        }
    }
}

/// In-memory metrics store; optionally fails every write.
#[derive(Debug, Default)]
pub struct MemoryMetricsStore {
    records: RefCell<Vec<SessionSummary>>,
    fail: bool,
}

impl MemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<SessionSummary> {
        self.records.borrow().clone()
    }
}

impl MetricsStore for MemoryMetricsStore {
    fn record(&self, summary: &SessionSummary) -> Result<()> {
        if self.fail {
            return Err(anyhow!("metrics store unavailable"));
        }
        self.records.borrow_mut().push(summary.clone());
        Ok(())
    }
}

/// Deterministic summary for persistence and reporting tests.
pub fn summary(session_id: &str, won: bool) -> SessionSummary {
    SessionSummary {
        session_id: session_id.to_string(),
        started_at: Utc::now(),
        turns: 4,
        rooms_explored: 3,
        death_by_pit: !won,
        death_by_wumpus: false,
        death_by_arrows: false,
        game_won: won,
        arrows_remaining: if won { 4 } else { 5 },
        oracle_errors: 0,
        read_timeouts: 0,
        average_decision_secs: 1.5,
        total_decision_secs: 6.0,
        ended_by: if won { SessionEnd::Won } else { SessionEnd::Lost },
    }
}
