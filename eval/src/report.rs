use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use wumpus_runner::core::summary::SessionSummary;
use wumpus_runner::io::metrics::load_summaries;

#[derive(Debug, Default, PartialEq)]
pub struct ReportSummary {
    pub sessions: usize,
    pub wins: usize,
    pub deaths_by_pit: usize,
    pub deaths_by_wumpus: usize,
    pub deaths_by_arrows: usize,
    /// Sessions that ended without a win or loss, keyed by ending.
    pub other_endings: BTreeMap<String, usize>,
    pub oracle_errors: u64,
    pub avg_turns: Option<f64>,
    pub avg_rooms_explored: Option<f64>,
    /// Mean of per-session decision latency, over sessions that made a decision.
    pub avg_decision_secs: Option<f64>,
}

impl ReportSummary {
    pub fn win_rate(&self) -> Option<f64> {
        (self.sessions > 0).then(|| self.wins as f64 / self.sessions as f64)
    }
}

/// Aggregate a JSONL metrics file. A missing file is an empty report;
/// unreadable lines become warnings.
pub fn aggregate(metrics_path: &Path) -> Result<(ReportSummary, Vec<String>)> {
    if !metrics_path.exists() {
        return Ok((
            ReportSummary::default(),
            vec![format!("no metrics at {}", metrics_path.display())],
        ));
    }
    let loaded = load_summaries(metrics_path)?;
    let warnings = loaded
        .skipped
        .iter()
        .map(|(line, reason)| format!("skip {}:{line}: {reason}", metrics_path.display()))
        .collect();
    Ok((summarize(&loaded.summaries), warnings))
}

fn summarize(summaries: &[SessionSummary]) -> ReportSummary {
    let mut report = ReportSummary {
        sessions: summaries.len(),
        ..ReportSummary::default()
    };
    let mut decision_means = Vec::new();
    for summary in summaries {
        if summary.game_won {
            report.wins += 1;
        }
        report.deaths_by_pit += usize::from(summary.death_by_pit);
        report.deaths_by_wumpus += usize::from(summary.death_by_wumpus);
        report.deaths_by_arrows += usize::from(summary.death_by_arrows);
        if !summary.ended_by.is_terminal() {
            *report
                .other_endings
                .entry(summary.ended_by.as_str().to_string())
                .or_insert(0) += 1;
        }
        report.oracle_errors += u64::from(summary.oracle_errors);
        if summary.total_decision_secs > 0.0 {
            decision_means.push(summary.average_decision_secs);
        }
    }
    report.avg_turns = mean(summaries.iter().map(|s| f64::from(s.turns)));
    report.avg_rooms_explored = mean(summaries.iter().map(|s| s.rooms_explored as f64));
    report.avg_decision_secs = mean(decision_means.into_iter());
    report
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (count, total) = values.fold((0usize, 0.0), |(count, total), value| {
        (count + 1, total + value)
    });
    (count > 0).then(|| total / count as f64)
}
