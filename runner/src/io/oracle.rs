//! Decision oracle abstraction.
//!
//! The [`Oracle`] trait decouples the session loop from the decision backend
//! (an external command such as `codex exec`). Tests use scripted oracles that
//! return predetermined actions without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use jsonschema::{Validator, validator_for};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::Action;
use crate::core::world::WorldState;
use crate::io::config::OracleConfig;
use crate::io::process::run_with_input;
use crate::io::prompt::PromptBuilder;

const ACTION_SCHEMA: &str = include_str!("../../../schemas/action.schema.json");

/// Stderr characters quoted in failure messages.
const STDERR_EXCERPT_CHARS: usize = 300;

/// Chooses the next action from a world-state snapshot.
pub trait Oracle {
    /// Any error is an oracle failure; the session ends without retrying.
    fn choose_action(&self, state: &WorldState) -> Result<Action>;
}

/// Oracle that runs an external command with the prompt on stdin.
pub struct CommandOracle {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
    prompt: PromptBuilder,
    validator: Validator,
}

impl CommandOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(anyhow!("oracle command is empty"));
        }
        Ok(Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
            prompt: PromptBuilder::default(),
            validator: action_validator()?,
        })
    }
}

impl Oracle for CommandOracle {
    #[instrument(skip_all, fields(program = %self.command[0], timeout_secs = self.timeout.as_secs()))]
    fn choose_action(&self, state: &WorldState) -> Result<Action> {
        let prompt = self.prompt.render(state).context("render oracle prompt")?;

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]);
        debug!(prompt_bytes = prompt.len(), "invoking oracle command");
        let output = run_with_input(cmd, &prompt, self.timeout, self.output_limit_bytes)
            .context("run oracle command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "oracle command timed out");
            return Err(anyhow!("oracle timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "oracle failed with status {:?}: {}",
                output.status.code(),
                output.stderr_excerpt(STDERR_EXCERPT_CHARS)
            ));
        }

        let action = parse_action(&output.stdout, &self.validator)?;
        info!(action = action.kind.as_str(), room = action.room, "oracle chose action");
        Ok(action)
    }
}

/// Compile the embedded action schema.
pub fn action_validator() -> Result<Validator> {
    let schema: Value = serde_json::from_str(ACTION_SCHEMA).context("parse action schema")?;
    validator_for(&schema).map_err(|err| anyhow!("invalid action schema: {}", err))
}

/// Extract, validate and decode the action in raw oracle output.
///
/// The output may carry chatter around the JSON; the last top-level object wins.
pub fn parse_action(raw: &str, validator: &Validator) -> Result<Action> {
    let value = last_json_object(raw).ok_or_else(|| anyhow!("no JSON object in oracle output"))?;
    if !validator.is_valid(&value) {
        let messages = validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "oracle action failed validation: {}",
            messages.join("; ")
        ));
    }
    serde_json::from_value(value).context("decode oracle action")
}

fn last_json_object(text: &str) -> Option<Value> {
    let mut found = None;
    let mut pos = 0;
    while let Some(rel) = text[pos..].find('{') {
        let start = pos + rel;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => {
                pos = start + stream.byte_offset();
                found = Some(value);
            }
            _ => pos = start + 1,
        }
    }
    found
}
