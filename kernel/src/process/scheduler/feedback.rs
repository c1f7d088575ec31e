//! Periodic CPU-share sampler: an interval sampler rather than a
//! per-tick counter reset, purely observational and never fed back
//! into scheduling decisions.
//!
//! Call `sample()` on every timer tick; it logs once every
//! `SAMPLE_INTERVAL_TICKS` and is a no-op otherwise. Never mutates any
//! field `pick_next` reads.

use core::sync::atomic::{AtomicU64, Ordering};

use super::super::TASKS;

/// ~0.5s at the PIT's 100Hz tick rate.
const SAMPLE_INTERVAL_TICKS: u64 = crate::clock::TICKS_PER_SECOND / 2;

static LAST_SAMPLE_TICK: AtomicU64 = AtomicU64::new(0);

pub fn sample(now_tick: u64) {
    let last = LAST_SAMPLE_TICK.load(Ordering::Relaxed);
    if now_tick.saturating_sub(last) < SAMPLE_INTERVAL_TICKS {
        return;
    }
    LAST_SAMPLE_TICK.store(now_tick, Ordering::Relaxed);

    let table = TASKS.lock();
    for task in table.tasks.iter() {
        if !task.slot_used {
            continue;
        }
        let share_percent = if now_tick == 0 { 0 } else { (task.sched.run_ticks * 100) / now_tick };
        log::debug!("sched: pid={} run_ticks={} cpu_share={}%", task.pid.0, task.sched.run_ticks, share_percent);
    }
}
