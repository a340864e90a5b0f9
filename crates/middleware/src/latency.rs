//! TSC clock for timing the ingest path without syscalls

use once_cell::sync::Lazy;
use quanta::Clock;

/// Shared calibrated clock. Calibration runs once, on first use.
pub static CLOCK: Lazy<Clock> = Lazy::new(Clock::new);

/// Raw counter reading; only meaningful relative to another one
#[inline]
pub fn now_tsc() -> u64 {
    CLOCK.raw()
}

/// Seconds elapsed since a raw TSC reading taken with [`now_tsc`]
#[inline]
pub fn elapsed_secs(start: u64) -> f64 {
    CLOCK.delta(start, now_tsc()).as_secs_f64()
}
