//! Completely-fair-share policy: every runnable task
//! accumulates `vruntime` at a rate inversely proportional to its
//! scheduling weight (derived from `nice`, same table Linux's CFS
//! uses), and the task with the smallest `vruntime` runs next. A task
//! that's been starved of CPU falls behind on `vruntime` and floats to
//! the front; a task that hogs it pulls ahead and waits its turn.

use super::super::{Pid, Task};
use super::is_runnable;

const NICE_0_LOAD: u64 = 1024;

/// Linux's `sched_prio_to_weight`, indexed by `nice + 20`.
const WEIGHTS: [u32; 40] = [
    88761, 71755, 56483, 46273, 36291, 29154, 23254, 18705, 14949, 11916, 9548, 7620, 6100, 4904, 3906, 3121, 2501,
    1991, 1586, 1277, 1024, 820, 655, 526, 423, 335, 272, 215, 172, 137, 110, 87, 70, 56, 45, 36, 29, 23, 18, 15,
];

fn weight_of(nice: i8) -> u64 {
    WEIGHTS[(nice as i32 + 20).clamp(0, 39) as usize] as u64
}

/// vruntime delta for one tick of wall-clock runtime at this weight.
fn vruntime_delta(nice: i8) -> u64 {
    (NICE_0_LOAD / weight_of(nice)).max(1)
}

pub fn pick_next(tasks: &mut [Task], current: Option<Pid>, _cursor: usize, _now_tick: u64) -> Option<Pid> {
    if let Some(pid) = current {
        if let Some(task) = tasks.iter_mut().find(|t| t.slot_used && t.pid == pid && is_runnable(t)) {
            task.sched.vruntime += vruntime_delta(task.sched.nice);
        }
    }

    tasks
        .iter()
        .filter(|t| is_runnable(t))
        .min_by_key(|t| t.sched.vruntime)
        .map(|t| t.pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessState, Task};

    fn task_with_vruntime(pid: u32, vruntime: u64) -> Task {
        let mut t = Task::test_slot();
        t.pid = Pid(pid);
        t.sched.vruntime = vruntime;
        t
    }

    #[test]
    fn picks_the_smallest_vruntime() {
        let mut tasks = [task_with_vruntime(1, 500), task_with_vruntime(2, 100), task_with_vruntime(3, 300)];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
    }

    #[test]
    fn running_task_accrues_vruntime_before_the_pick() {
        let mut tasks = [task_with_vruntime(1, 100), task_with_vruntime(2, 100)];
        let picked = pick_next(&mut tasks, Some(Pid(1)), 0, 0).unwrap();
        assert_eq!(picked, Pid(2));
        assert!(tasks[0].sched.vruntime > 100);
    }

    #[test]
    fn niced_down_task_accrues_vruntime_faster() {
        assert!(vruntime_delta(19) > vruntime_delta(-20));
    }

    #[test]
    fn skips_non_runnable_tasks() {
        let mut tasks = [task_with_vruntime(1, 0), task_with_vruntime(2, 100)];
        tasks[0].state = ProcessState::Zombie;
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
    }
}
