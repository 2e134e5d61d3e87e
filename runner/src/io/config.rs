//! Agent configuration stored under `.wumpus/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::turn::TurnSettings;

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".wumpus/config.toml";

/// Agent configuration (TOML).
///
/// Missing fields fall back to defaults, so a file only needs the values it
/// changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WumpusConfig {
    /// Oracle decisions allowed per session before it is cut off.
    pub max_turns: u32,

    /// JSONL file that receives one summary per session.
    pub metrics_path: PathBuf,

    pub game: GameConfig,

    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Game executable followed by its arguments.
    pub command: Vec<String>,
    pub read_timeout_secs: u64,
    /// How long an interrupted game gets to exit before it is killed.
    pub teardown_grace_secs: u64,
    pub initial_arrows: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Decision command; receives the prompt on stdin and prints a JSON action.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    /// Oracle stdout/stderr beyond this many bytes is discarded.
    pub output_limit_bytes: usize,
}

impl Default for WumpusConfig {
    fn default() -> Self {
        Self {
            max_turns: 200,
            metrics_path: PathBuf::from(".wumpus/metrics.jsonl"),
            game: GameConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            command: vec!["wumpus".to_string()],
            read_timeout_secs: 5,
            teardown_grace_secs: 5,
            initial_arrows: 5,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            command: ["codex", "exec", "--skip-git-repo-check", "-"]
                .into_iter()
                .map(String::from)
                .collect(),
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl GameConfig {
    pub fn turn_settings(&self) -> TurnSettings {
        TurnSettings {
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            teardown_grace: Duration::from_secs(self.teardown_grace_secs),
            initial_arrows: self.initial_arrows,
        }
    }
}

impl WumpusConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.metrics_path.as_os_str().is_empty() {
            return Err(anyhow!("metrics_path must not be empty"));
        }
        if !is_command(&self.game.command) {
            return Err(anyhow!("game.command must be a non-empty array"));
        }
        if self.game.read_timeout_secs == 0 {
            return Err(anyhow!("game.read_timeout_secs must be > 0"));
        }
        if self.game.teardown_grace_secs == 0 {
            return Err(anyhow!("game.teardown_grace_secs must be > 0"));
        }
        if self.game.initial_arrows == 0 {
            return Err(anyhow!("game.initial_arrows must be > 0"));
        }
        if !is_command(&self.oracle.command) {
            return Err(anyhow!("oracle.command must be a non-empty array"));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(anyhow!("oracle.timeout_secs must be > 0"));
        }
        if self.oracle.output_limit_bytes == 0 {
            return Err(anyhow!("oracle.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

fn is_command(command: &[String]) -> bool {
    command.first().is_some_and(|program| !program.trim().is_empty())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WumpusConfig::default()`.
pub fn load_config(path: &Path) -> Result<WumpusConfig> {
    if !path.exists() {
        let cfg = WumpusConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WumpusConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WumpusConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
