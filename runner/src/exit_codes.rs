//! Stable exit codes for `wumpus-runner` commands.

/// Command succeeded; for `play`, the game reached a win or loss.
pub const OK: i32 = 0;
/// Invalid config, failed persistence or any other error.
pub const INVALID: i32 = 1;
/// `play` ended without a terminal condition (oracle failure, process exit,
/// turn limit, abort or spawn failure).
pub const NO_TERMINAL: i32 = 2;
/// A second interrupt arrived before the aborted session could wind down.
pub const INTERRUPTED: i32 = 130;
