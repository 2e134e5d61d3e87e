//! Shared time budget helpers for bounded waits.

use std::time::{Duration, Instant};

/// Return the time left until `deadline`, or zero once it has passed.
pub fn remaining_budget(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now())
}
