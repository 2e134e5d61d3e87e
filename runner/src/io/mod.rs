//! I/O adapters: game channel, oracle, config and metrics.

pub mod channel;
pub mod config;
pub mod metrics;
pub mod oracle;
pub mod process;
pub mod prompt;
