//! Tick-deadline sleep queue backing `nanosleep`: parks the caller
//! until a given absolute tick count passes, woken from the timer-tick
//! path instead of polling `clock::has_passed` in a loop.

use spin::Mutex;

use super::wait_queue::{sleep_on, wake_specific, WaitQueue, WakeReason};
use super::{Pid, ProcessState, MAX_TASKS};

#[derive(Clone, Copy)]
struct Sleeper {
    used: bool,
    pid: Pid,
    deadline: u64,
}

impl Sleeper {
    const fn empty() -> Self {
        Self { used: false, pid: Pid(0), deadline: 0 }
    }
}

struct SleepTable {
    sleepers: [Sleeper; MAX_TASKS],
}

impl SleepTable {
    const fn new() -> Self {
        Self { sleepers: [Sleeper::empty(); MAX_TASKS] }
    }
}

static TABLE: Mutex<SleepTable> = Mutex::new(SleepTable::new());
static QUEUE: WaitQueue = WaitQueue::new();

/// Park the calling task until `deadline` (an absolute tick count from
/// `clock::deadline_after`) passes, or a signal cancels the sleep.
pub fn sleep_until(pid: Pid, deadline: u64) -> WakeReason {
    if crate::clock::has_passed(deadline) {
        return WakeReason::Woken;
    }

    {
        let mut table = TABLE.lock();
        match table.sleepers.iter().position(|s| !s.used) {
            Some(slot) => table.sleepers[slot] = Sleeper { used: true, pid, deadline },
            None => return WakeReason::Woken, // table full: don't block, caller retries
        }
    }

    let reason = unsafe { sleep_on(&QUEUE, pid, ProcessState::Interruptible) };

    let mut table = TABLE.lock();
    if let Some(slot) = table.sleepers.iter().position(|s| s.used && s.pid == pid) {
        table.sleepers[slot].used = false;
    }
    reason
}

/// Wake every sleeper whose deadline has passed as of `now`. Called
/// once per timer tick.
pub fn check_deadlines(now: u64) {
    let mut table = TABLE.lock();
    for slot in 0..MAX_TASKS {
        if table.sleepers[slot].used && now >= table.sleepers[slot].deadline {
            let pid = table.sleepers[slot].pid;
            table.sleepers[slot].used = false;
            unsafe { wake_specific(&QUEUE, pid) };
        }
    }
}
