//! Wiring for `wumpus-runner play`: builds the production collaborators from
//! config and runs sessions with them.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::core::summary::SessionSummary;
use crate::exit_codes;
use crate::io::channel::PtyChannel;
use crate::io::config::WumpusConfig;
use crate::io::metrics::JsonlMetricsStore;
use crate::io::oracle::CommandOracle;
use crate::session::{AbortHandle, PersistError, SessionContext, TurnResult, run_session};

/// Production agent: pty game channel, command oracle, JSONL metrics.
pub struct Agent {
    config: WumpusConfig,
    oracle: CommandOracle,
    store: JsonlMetricsStore,
}

impl Agent {
    pub fn from_config(config: &WumpusConfig) -> Result<Self> {
        config.validate()?;
        let oracle = CommandOracle::new(&config.oracle).context("build oracle")?;
        Ok(Self {
            config: config.clone(),
            oracle,
            store: JsonlMetricsStore::new(&config.metrics_path),
        })
    }

    pub fn metrics_store(&self) -> &JsonlMetricsStore {
        &self.store
    }

    /// Run one isolated session against a freshly spawned game.
    pub fn play<T: FnMut(&TurnResult)>(
        &self,
        abort: AbortHandle,
        on_turn: T,
    ) -> Result<SessionSummary, PersistError> {
        let ctx = SessionContext::new(self.config.max_turns).with_abort(abort);
        info!(session_id = %ctx.session_id, command = ?self.config.game.command, "starting session");
        let command = self.config.game.command.clone();
        run_session(
            ctx,
            move || PtyChannel::start(&command),
            self.config.game.turn_settings(),
            &self.oracle,
            &self.store,
            on_turn,
        )
    }
}

/// Route Ctrl-C and SIGTERM to `abort`.
///
/// The first signal aborts the running session, which still tears the game
/// down and persists its summary. A second one exits immediately. Can be
/// installed once per process.
pub fn abort_on_interrupt(abort: &AbortHandle) -> Result<()> {
    let abort = abort.clone();
    ctrlc::set_handler(move || {
        if abort.is_aborted() {
            std::process::exit(exit_codes::INTERRUPTED);
        }
        warn!("interrupt received, aborting session");
        abort.abort();
    })
    .context("install interrupt handler")
}

/// One-line human summary printed at the end of a session.
pub fn summary_line(summary: &SessionSummary) -> String {
    format!(
        "{} ended_by={} turns={} rooms={} arrows={} oracle_errors={} avg_decision={:.2}s",
        summary.session_id,
        summary.ended_by.as_str(),
        summary.turns,
        summary.rooms_explored,
        summary.arrows_remaining,
        summary.oracle_errors,
        summary.average_decision_secs,
    )
}
