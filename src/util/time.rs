//! Tick-based time utilities for the match simulation

use std::time::Duration;

/// Simulation tick rate
pub const TICKS_PER_SECOND: u32 = 20; // 20 ticks per second
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICKS_PER_SECOND as u64;

/// Wall-clock duration of one simulation tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(TICK_DURATION_MICROS)
}

/// Convert whole seconds to ticks
pub fn secs_to_ticks(secs: u32) -> u32 {
    secs.saturating_mul(TICKS_PER_SECOND)
}

/// Format a tick count as `m:ss`, rounding down to whole seconds
pub fn format_clock(ticks: i64) -> String {
    let seconds = ticks.max(0) / TICKS_PER_SECOND as i64;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
