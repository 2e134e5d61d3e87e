//! Autonomous Hunt the Wumpus agent.
//!
//! Drives the classic text game as a subprocess, parses its free-text output
//! into a world model and asks an external oracle for one action per turn.
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parsing, state merging, summaries).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (pty game channel, oracle command,
//!   config, metrics). Each sits behind a trait so tests can script it.
//!
//! Orchestration modules ([`turn`], [`session`], [`play`]) couple the two.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod play;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod turn;
