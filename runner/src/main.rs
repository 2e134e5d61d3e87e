//! Hunt the Wumpus agent CLI.
//!
//! Plays the text game through a pseudo-terminal, asking an external oracle
//! command for every move, and appends one summary per session to a JSONL
//! metrics file.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use wumpus_runner::exit_codes;
use wumpus_runner::io::config::{DEFAULT_CONFIG_PATH, WumpusConfig, load_config, write_config};
use wumpus_runner::logging;
use wumpus_runner::play::{Agent, abort_on_interrupt, summary_line};
use wumpus_runner::session::{AbortHandle, TurnResult};

#[derive(Parser)]
#[command(
    name = "wumpus-runner",
    version,
    about = "Autonomous Hunt the Wumpus agent"
)]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config.
    Validate,
    /// Play one session and print its summary.
    Play,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: &Cli) -> Result<i32> {
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Validate => cmd_validate(&cli.config),
        Command::Play => cmd_play(&cli.config),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &WumpusConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(path: &Path) -> Result<i32> {
    load_config(path)?;
    println!("ok");
    Ok(exit_codes::OK)
}

fn cmd_play(path: &Path) -> Result<i32> {
    let config = load_config(path)?;
    let agent = Agent::from_config(&config)?;
    let abort = AbortHandle::new();
    abort_on_interrupt(&abort)?;
    match agent.play(abort, print_turn) {
        Ok(summary) => {
            println!("{}", summary_line(&summary));
            Ok(if summary.ended_by.is_terminal() {
                exit_codes::OK
            } else {
                exit_codes::NO_TERMINAL
            })
        }
        Err(err) => {
            println!("{}", summary_line(&err.summary));
            Err(err.into())
        }
    }
}

fn print_turn(turn: &TurnResult) {
    println!(
        "turn {}: {} {} ({:.1}s) {}",
        turn.turn,
        turn.action.kind.as_str(),
        turn.action.room,
        turn.decision_time.as_secs_f64(),
        turn.action.reasoning
    );
}
