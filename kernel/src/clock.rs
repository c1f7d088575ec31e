//! Monotonic tick counter, ticks-per-second, wall-clock seconds.
//! Backed by the PIT tick interrupt; see `interrupts::idt` for where
//! `tick()` is called.

use core::sync::atomic::{AtomicU64, Ordering};

/// PIT is programmed to this frequency in `pit::init`.
pub const TICKS_PER_SECOND: u64 = 100;

static TICKS: AtomicU64 = AtomicU64::new(0);

/// Advance the tick counter. Called once per timer interrupt.
pub fn tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Monotonic tick counter since boot.
pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

/// Whole seconds elapsed since boot.
pub fn wall_clock_seconds() -> u64 {
    ticks() / TICKS_PER_SECOND
}

/// Absolute tick deadline `millis` milliseconds in the future, for
/// `nanosleep` to poll against.
pub fn deadline_after(millis: u64) -> u64 {
    ticks() + (millis * TICKS_PER_SECOND) / 1000
}

pub fn has_passed(deadline: u64) -> bool {
    ticks() >= deadline
}
