//! Back-to-back session execution.
//!
//! Sessions are isolated: each gets its own context and game process, and a
//! failure to persist one summary does not stop the run.

use tracing::{info, instrument, warn};
use wumpus_runner::core::summary::SessionSummary;
use wumpus_runner::session::{AbortHandle, PersistError};

/// One finished session of an evaluation run.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub index: u32,
    pub summary: SessionSummary,
    /// Why the summary could not be persisted, if it could not.
    pub persist_error: Option<String>,
}

/// Play `sessions` sessions with `play`, stopping early only when `abort` is set.
#[instrument(skip_all, fields(sessions = sessions))]
pub fn run_sessions<P, F>(
    sessions: u32,
    abort: &AbortHandle,
    mut play: P,
    mut on_session: F,
) -> Vec<SessionRecord>
where
    P: FnMut(u32) -> Result<SessionSummary, PersistError>,
    F: FnMut(&SessionRecord),
{
    let mut records = Vec::new();
    for index in 1..=sessions {
        if abort.is_aborted() {
            warn!(completed = records.len(), "evaluation aborted");
            break;
        }
        let record = match play(index) {
            Ok(summary) => SessionRecord {
                index,
                summary,
                persist_error: None,
            },
            Err(err) => {
                warn!(index, err = %err, "session summary not persisted");
                SessionRecord {
                    index,
                    persist_error: Some(format!("{:#}", err.cause)),
                    summary: err.summary,
                }
            }
        };
        info!(index, ended_by = record.summary.ended_by.as_str(), "session complete");
        on_session(&record);
        records.push(record);
    }
    records
}
