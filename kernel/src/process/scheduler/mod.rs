//! Policy-pluggable scheduler.
//!
//! Exactly one policy module is compiled in, selected by the
//! `sched-*` Cargo features at build time; each exposes a single
//! `pick_next` function with the same signature, so the rest of the
//! kernel never branches on policy. Round-robin is the default so a
//! plain `cargo build` still produces something schedulable.

pub mod cfs;
pub mod edf_rm;
pub mod feedback;
pub mod priority;
pub mod round_robin;

use spin::Mutex;

use super::context::{switch_context, Context};
use super::{Pid, ProcessState, Task, TASKS};

#[cfg(feature = "sched-cfs")]
pub use cfs::pick_next;
#[cfg(feature = "sched-edf-rm")]
pub use edf_rm::pick_next;
#[cfg(feature = "sched-priority")]
pub use priority::pick_next;
#[cfg(all(
    feature = "sched-rr",
    not(feature = "sched-priority"),
    not(feature = "sched-cfs"),
    not(feature = "sched-edf-rm")
))]
pub use round_robin::pick_next;

/// `nice` is clamped to this range.
pub const NICE_MIN: i8 = -20;
pub const NICE_MAX: i8 = 19;

pub fn clamp_nice(nice: i32) -> i8 {
    nice.clamp(NICE_MIN as i32, NICE_MAX as i32) as i8
}

struct SchedulerState {
    current: Option<Pid>,
    /// Round-robin rotation cursor / CFS,EDF tie-break cursor: the
    /// task-table index to resume scanning from next.
    cursor: usize,
}

static SCHEDULER: Mutex<SchedulerState> = Mutex::new(SchedulerState { current: None, cursor: 0 });

pub fn current() -> Option<Pid> {
    SCHEDULER.lock().current
}

/// Run on every timer tick. Advances accounting for the running task,
/// then reschedules.
pub fn on_tick() {
    if let Some(pid) = current() {
        super::with_task(pid, |t| t.sched.run_ticks += 1);
    }
    feedback::sample(crate::clock::ticks());
    super::sleep::check_deadlines(crate::clock::ticks());
    reschedule();
}

/// Voluntary reschedule point.
pub fn yield_cpu() {
    reschedule();
}

fn reschedule() {
    let next = {
        let mut table = TASKS.lock();
        let mut sched = SCHEDULER.lock();
        let now = crate::clock::ticks();
        let next = pick_next(&mut table.tasks, sched.current, sched.cursor, now);
        if let Some(pid) = next {
            if let Some(idx) = table.tasks.iter().position(|t| t.slot_used && t.pid == pid) {
                sched.cursor = (idx + 1) % table.tasks.len();
                table.tasks[idx].sched.last_scheduled_tick = now;
            }
        }
        next
    };

    let Some(next_pid) = next else { return };
    let had_current = current().is_some();
    if had_current && Some(next_pid) == current() {
        return;
    }

    let (old_ctx_ptr, new_ctx_ptr, new_dir_frame) = {
        let mut table = TASKS.lock();
        let mut sched = SCHEDULER.lock();

        let old_ptr = sched
            .current
            .and_then(|pid| table.tasks.iter_mut().find(|t| t.slot_used && t.pid == pid))
            .map(|t| &mut t.context as *mut Context)
            .unwrap_or(core::ptr::null_mut());

        let new_task = table
            .tasks
            .iter_mut()
            .find(|t| t.slot_used && t.pid == next_pid)
            .unwrap_or_else(|| crate::errno::kernel_bug("scheduler picked a nonexistent task"));
        new_task.state = ProcessState::Running;
        let new_ptr = &mut new_task.context as *mut Context;
        let dir_frame = new_task.address_space.as_ref().map(|s| s.directory_frame());

        sched.current = Some(next_pid);
        (old_ptr, new_ptr, dir_frame)
    };

    if let Some(frame) = new_dir_frame {
        unsafe {
            core::arch::asm!("mov cr3, {0}", in(reg) frame.start_address(), options(nostack, preserves_flags));
        }
    }

    if had_current {
        unsafe { switch_context(old_ctx_ptr, new_ctx_ptr) };
    } else {
        unsafe { super::context::bootstrap_first_task(new_ctx_ptr) };
    }
}

/// Is `task` eligible to be picked?
pub(super) fn is_runnable(task: &Task) -> bool {
    task.slot_used && task.state == ProcessState::Running
}
