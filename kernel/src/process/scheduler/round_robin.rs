//! Round-robin policy: runnable tasks are visited in
//! task-table order, cycling back to the start; each gets one tick's
//! worth of CPU before the cursor moves on. The default policy, so an
//! unadorned build is schedulable without picking a feature.

use super::super::{Pid, Task};
use super::is_runnable;

pub fn pick_next(tasks: &mut [Task], _current: Option<Pid>, cursor: usize, _now_tick: u64) -> Option<Pid> {
    let len = tasks.len();
    if len == 0 {
        return None;
    }
    for offset in 0..len {
        let idx = (cursor + offset) % len;
        if is_runnable(&tasks[idx]) {
            return Some(tasks[idx].pid);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessState, Task};

    fn runnable_task(pid: u32) -> Task {
        let mut t = Task::test_slot();
        t.pid = Pid(pid);
        t.state = ProcessState::Running;
        t
    }

    #[test]
    fn rotates_through_runnable_tasks_from_cursor() {
        let mut tasks = [runnable_task(1), runnable_task(2), runnable_task(3)];
        assert_eq!(pick_next(&mut tasks, None, 1, 0), Some(Pid(2)));
        assert_eq!(pick_next(&mut tasks, None, 2, 0), Some(Pid(3)));
    }

    #[test]
    fn skips_non_runnable_tasks() {
        let mut tasks = [runnable_task(1), runnable_task(2), runnable_task(3)];
        tasks[1].state = ProcessState::Zombie;
        assert_eq!(pick_next(&mut tasks, None, 1, 0), Some(Pid(3)));
    }

    #[test]
    fn returns_none_when_nothing_runnable() {
        let mut tasks = [runnable_task(1)];
        tasks[0].state = ProcessState::Zombie;
        assert_eq!(pick_next(&mut tasks, None, 0, 0), None);
    }
}
