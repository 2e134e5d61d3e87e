//! Oracle prompt rendering.

use anyhow::Result;
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::world::WorldState;

const ORACLE_TEMPLATE: &str = include_str!("prompts/oracle.md");

/// Default cap on the recent-output section, in bytes.
pub const DEFAULT_OUTPUT_BUDGET_BYTES: usize = 4_000;

/// Renders world-state snapshots into oracle prompts.
pub struct PromptBuilder {
    env: Environment<'static>,
    output_budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(output_budget_bytes: usize) -> Self {
        let mut env = Environment::new();
        env.add_template("oracle", ORACLE_TEMPLATE)
            .expect("oracle template should be valid");
        Self {
            env,
            output_budget_bytes,
        }
    }

    pub fn render(&self, state: &WorldState) -> Result<String> {
        let template = self.env.get_template("oracle")?;
        let explored: Vec<u32> = state.explored_rooms.iter().copied().collect();
        let rendered = template.render(context! {
            current_room => state.current_room,
            adjacent => &state.adjacent_rooms,
            unexplored => state.unexplored_adjacent(),
            explored => explored,
            arrows_left => state.arrows_left,
            bat_nearby => state.bat_nearby,
            draft_felt => state.draft_felt,
            wumpus_smell => state.wumpus_smell,
            output => recent_output(&state.last_output, self.output_budget_bytes),
        })?;
        Ok(rendered)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_BUDGET_BYTES)
    }
}

/// Join the newest non-empty output lines that fit in `budget` bytes.
fn recent_output(lines: &[String], budget: usize) -> String {
    let mut kept = Vec::new();
    let mut used = 0usize;
    for line in lines.iter().rev().filter(|line| !line.is_empty()) {
        let cost = line.len() + 1;
        if used + cost > budget {
            debug!(
                dropped = lines.len() - kept.len(),
                budget, "dropped oldest output lines for budget"
            );
            break;
        }
        used += cost;
        kept.push(line.as_str());
    }
    if kept.is_empty() {
        return "(none)".to_string();
    }
    kept.reverse();
    kept.join("\n")
}
