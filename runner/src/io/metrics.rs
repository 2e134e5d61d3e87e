//! Session summary persistence.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::summary::SessionSummary;

/// Destination for finished session summaries.
pub trait MetricsStore {
    fn record(&self, summary: &SessionSummary) -> Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlMetricsStore {
    path: PathBuf,
}

impl JsonlMetricsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsStore for JsonlMetricsStore {
    fn record(&self, summary: &SessionSummary) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("create metrics dir {}", parent.display()))?;
        }
        let mut line = serde_json::to_string(summary).context("serialize session summary")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("open metrics {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("append metrics {}", self.path.display()))?;
        debug!(path = %self.path.display(), session_id = %summary.session_id, "recorded session summary");
        Ok(())
    }
}

/// Summaries read back from a metrics file, plus lines that could not be read.
#[derive(Debug, Default)]
pub struct LoadedMetrics {
    pub summaries: Vec<SessionSummary>,
    /// `(line number, reason)` for every skipped line.
    pub skipped: Vec<(usize, String)>,
}

/// Read every summary in a JSONL metrics file. Blank lines are ignored;
/// malformed lines are reported in `skipped` instead of failing the load.
pub fn load_summaries(path: &Path) -> Result<LoadedMetrics> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read metrics {}", path.display()))?;
    let mut loaded = LoadedMetrics::default();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SessionSummary>(line) {
            Ok(summary) => loaded.summaries.push(summary),
            Err(err) => {
                warn!(line = idx + 1, err = %err, "skipping unreadable metrics line");
                loaded.skipped.push((idx + 1, err.to_string()));
            }
        }
    }
    Ok(loaded)
}
