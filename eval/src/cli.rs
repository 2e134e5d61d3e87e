//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::info;
use wumpus_runner::io::config::load_config;
use wumpus_runner::play::{Agent, abort_on_interrupt, summary_line};
use wumpus_runner::session::AbortHandle;

use crate::report::aggregate;
use crate::run::run_sessions as run_all;

/// Play `sessions` sessions and print one line per session.
pub fn run_sessions(config_path: &Path, sessions: u32) -> Result<()> {
    if sessions == 0 {
        bail!("--sessions must be > 0");
    }
    let config = load_config(config_path).context("load config")?;
    let agent = Agent::from_config(&config)?;
    info!(sessions, metrics = %agent.metrics_store().path().display(), "starting evaluation");

    let abort = AbortHandle::new();
    abort_on_interrupt(&abort)?;
    let records = run_all(
        sessions,
        &abort,
        |_| agent.play(abort.clone(), |_| {}),
        |record| {
            println!("run: {}", summary_line(&record.summary));
            if let Some(err) = &record.persist_error {
                eprintln!("warning: session {} not persisted: {}", record.summary.session_id, err);
            }
        },
    );

    let wins = records.iter().filter(|r| r.summary.game_won).count();
    println!("run: sessions={} wins={}", records.len(), wins);
    Ok(())
}

/// Print aggregated metrics.
pub fn report(config_path: &Path, metrics: Option<&Path>) -> Result<()> {
    let metrics_path = match metrics {
        Some(path) => path.to_path_buf(),
        None => load_config(config_path).context("load config")?.metrics_path,
    };
    let (summary, warnings) = aggregate(&metrics_path)?;
    println!("report: sessions={} wins={}", summary.sessions, summary.wins);
    if let Some(rate) = summary.win_rate() {
        println!("report: win_rate={:.3}", rate);
    }
    println!(
        "report: deaths pit={} wumpus={} arrows={}",
        summary.deaths_by_pit, summary.deaths_by_wumpus, summary.deaths_by_arrows
    );
    for (ending, count) in &summary.other_endings {
        println!("report: ended_by {} {}", ending, count);
    }
    println!("report: oracle_errors={}", summary.oracle_errors);
    if let Some(avg) = summary.avg_turns {
        println!("report: avg_turns={:.2}", avg);
    }
    if let Some(avg) = summary.avg_rooms_explored {
        println!("report: avg_rooms_explored={:.2}", avg);
    }
    if let Some(avg) = summary.avg_decision_secs {
        println!("report: avg_decision_secs={:.2}", avg);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}
