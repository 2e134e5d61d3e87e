mod cli;
mod report;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use wumpus_runner::io::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(
    name = "wumpus-eval",
    version,
    about = "Multi-session evaluation for the wumpus agent"
)]
struct Cli {
    /// Agent config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play sessions back to back, each against a fresh game.
    Run {
        #[arg(long, default_value_t = 1)]
        sessions: u32,
    },
    /// Aggregate the metrics file.
    Report {
        /// Metrics file; defaults to `metrics_path` from the config.
        #[arg(long)]
        metrics: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    wumpus_runner::logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run { sessions } => cli::run_sessions(&cli.config, sessions),
        Command::Report { metrics } => cli::report(&cli.config, metrics.as_deref()),
    }
}
