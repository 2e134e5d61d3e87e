//! Session loop: drives one game from spawn to a terminal condition or abort.
//!
//! Every exit path (win, loss, oracle failure, abort, process death, spawn
//! failure) produces exactly one [`SessionSummary`], which is handed to the
//! metrics store exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::core::summary::{SessionSummary, SummaryInput};
use crate::core::types::{Action, SessionEnd};
use crate::core::world::WorldState;
use crate::io::channel::{ChannelError, GameChannel};
use crate::io::metrics::MetricsStore;
use crate::io::oracle::Oracle;
use crate::turn::{TurnController, TurnError, TurnSettings};

/// Cooperative cancellation flag, checked before each oracle decision and
/// again once it returns.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-session counters. One context per session; nothing is shared between
/// sessions.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub turns: u32,
    pub oracle_errors: u32,
    pub decision_times: Vec<Duration>,
    pub max_turns: u32,
    pub abort: AbortHandle,
}

impl SessionContext {
    pub fn new(max_turns: u32) -> Self {
        let started_at = Utc::now();
        Self {
            session_id: format!("session-{}", started_at.format("%Y%m%d_%H%M%S_%6f")),
            started_at,
            turns: 0,
            oracle_errors: 0,
            decision_times: Vec::new(),
            max_turns,
            abort: AbortHandle::new(),
        }
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }
}

/// What happened in one completed turn.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub turn: u32,
    pub action: Action,
    /// State after the action's output was merged.
    pub state: WorldState,
    /// Time spent waiting on the oracle.
    pub decision_time: Duration,
}

/// The summary could not be persisted. The summary itself is still returned.
#[derive(Debug, Error)]
#[error("persist session summary: {cause:#}")]
pub struct PersistError {
    pub summary: SessionSummary,
    pub cause: anyhow::Error,
}

/// Play one session and persist its summary.
#[instrument(skip_all, fields(session_id = %ctx.session_id))]
pub fn run_session<C, F, O, M, T>(
    mut ctx: SessionContext,
    spawn: F,
    settings: TurnSettings,
    oracle: &O,
    store: &M,
    mut on_turn: T,
) -> Result<SessionSummary, PersistError>
where
    C: GameChannel,
    F: FnOnce() -> Result<C, ChannelError>,
    O: Oracle + ?Sized,
    M: MetricsStore + ?Sized,
    T: FnMut(&TurnResult),
{
    let initial_arrows = settings.initial_arrows;
    let (state, read_timeouts, ended_by) = match TurnController::initialize(spawn, settings) {
        Ok(mut controller) => {
            let ended_by = drive(&mut ctx, &mut controller, oracle, &mut on_turn);
            controller.teardown();
            (controller.snapshot(), controller.read_timeouts(), ended_by)
        }
        Err(err) => {
            error!(err = %err, "game failed to start");
            (WorldState::new(initial_arrows), 0, SessionEnd::StartFailed)
        }
    };

    let summary = SessionSummary::assemble(
        &state,
        &SummaryInput {
            session_id: &ctx.session_id,
            started_at: ctx.started_at,
            turns: ctx.turns,
            oracle_errors: ctx.oracle_errors,
            read_timeouts,
            decision_times: &ctx.decision_times,
            ended_by,
        },
    );
    info!(
        ended_by = ?summary.ended_by,
        turns = summary.turns,
        rooms = summary.rooms_explored,
        won = summary.game_won,
        "session finished"
    );

    match store.record(&summary) {
        Ok(()) => Ok(summary),
        Err(cause) => {
            error!(err = %format!("{cause:#}"), "failed to persist session summary");
            Err(PersistError { summary, cause })
        }
    }
}

fn drive<C, O, T>(
    ctx: &mut SessionContext,
    controller: &mut TurnController<C>,
    oracle: &O,
    on_turn: &mut T,
) -> SessionEnd
where
    C: GameChannel,
    O: Oracle + ?Sized,
    T: FnMut(&TurnResult),
{
    loop {
        if controller.state().game_over {
            return if controller.state().win_state {
                SessionEnd::Won
            } else {
                SessionEnd::Lost
            };
        }
        if ctx.abort.is_aborted() {
            warn!(turns = ctx.turns, "session aborted");
            return SessionEnd::Aborted;
        }
        if !controller.is_alive() {
            warn!(turns = ctx.turns, "game process exited without a terminal condition");
            return SessionEnd::ProcessExited;
        }
        if ctx.turns >= ctx.max_turns {
            warn!(max_turns = ctx.max_turns, "turn limit reached");
            return SessionEnd::TurnLimit;
        }

        ctx.turns += 1;
        let snapshot = controller.snapshot();
        let started = Instant::now();
        let decision = oracle.choose_action(&snapshot);
        // An abort raised while the oracle was thinking wins over its answer.
        if ctx.abort.is_aborted() {
            warn!(turn = ctx.turns, "session aborted during oracle call");
            return SessionEnd::Aborted;
        }
        let action = match decision {
            Ok(action) => action,
            Err(err) => {
                ctx.oracle_errors += 1;
                error!(turn = ctx.turns, err = %format!("{err:#}"), "oracle failed");
                return SessionEnd::OracleFailed;
            }
        };
        let decision_time = started.elapsed();
        ctx.decision_times.push(decision_time);
        info!(
            turn = ctx.turns,
            action = action.kind.as_str(),
            room = action.room,
            reasoning = %action.reasoning,
            "executing action"
        );

        match controller.execute(&action) {
            Ok(()) => {}
            Err(TurnError::Channel(ChannelError::Exited)) => {
                warn!(turn = ctx.turns, "game process exited mid-turn");
                return SessionEnd::ProcessExited;
            }
            Err(err) => {
                error!(turn = ctx.turns, err = %err, "turn failed");
                return SessionEnd::GameIoFailed;
            }
        }

        on_turn(&TurnResult {
            turn: ctx.turns,
            action,
            state: controller.snapshot(),
            decision_time,
        });
    }
}
