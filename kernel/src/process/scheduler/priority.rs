//! Static-priority-with-ageing policy: the runnable task
//! with the highest `dynamic_priority` runs next; every task passed
//! over this round has its dynamic priority nudged up so nothing starves
//! forever, and the task actually picked has its dynamic priority reset
//! to its static baseline.

use super::super::{Pid, Task};
use super::is_runnable;

/// Dynamic priority never ages past this far above its static baseline.
const MAX_AGEING_BONUS: u8 = 10;

pub fn pick_next(tasks: &mut [Task], _current: Option<Pid>, cursor: usize, _now_tick: u64) -> Option<Pid> {
    let len = tasks.len();
    if len == 0 {
        return None;
    }

    let mut best_idx = None;
    let mut best_priority = 0u8;
    for offset in 0..len {
        let idx = (cursor + offset) % len;
        if !is_runnable(&tasks[idx]) {
            continue;
        }
        let priority = tasks[idx].sched.dynamic_priority;
        if best_idx.is_none() || priority > best_priority {
            best_idx = Some(idx);
            best_priority = priority;
        }
    }

    let winner = best_idx?;
    for idx in 0..len {
        if !is_runnable(&tasks[idx]) {
            continue;
        }
        if idx == winner {
            tasks[idx].sched.dynamic_priority = tasks[idx].sched.static_priority;
        } else {
            let cap = tasks[idx].sched.static_priority.saturating_add(MAX_AGEING_BONUS);
            tasks[idx].sched.dynamic_priority = tasks[idx].sched.dynamic_priority.saturating_add(1).min(cap);
        }
    }
    Some(tasks[winner].pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessState, Task};

    fn task_with_priority(pid: u32, priority: u8) -> Task {
        let mut t = Task::test_slot();
        t.pid = Pid(pid);
        t.sched.static_priority = priority;
        t.sched.dynamic_priority = priority;
        t
    }

    #[test]
    fn picks_the_highest_dynamic_priority() {
        let mut tasks = [task_with_priority(1, 10), task_with_priority(2, 30), task_with_priority(3, 20)];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
    }

    #[test]
    fn passed_over_tasks_age_toward_eligibility() {
        let mut tasks = [task_with_priority(1, 10), task_with_priority(2, 11)];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
        assert_eq!(tasks[0].sched.dynamic_priority, 11);
        assert_eq!(tasks[1].sched.dynamic_priority, 11); // reset to static baseline
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(1)));
    }

    #[test]
    fn skips_non_runnable_tasks() {
        let mut tasks = [task_with_priority(1, 50), task_with_priority(2, 10)];
        tasks[0].state = ProcessState::Zombie;
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
    }
}
