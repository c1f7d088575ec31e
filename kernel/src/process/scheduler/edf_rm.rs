//! Earliest-deadline-first / rate-monotonic policy: for
//! real-time tasks, the nearest deadline wins; a periodic task with no
//! explicit deadline gets an implicit one of `last_scheduled + period`,
//! which collapses rate-monotonic (shorter period ⇒ tighter implicit
//! deadline ⇒ higher priority) into the same earliest-deadline compare.
//! Best-effort tasks (no period, no deadline) are lowest priority and
//! run least-recently-scheduled first when no real-time task is ready.

use super::super::{Pid, Task};
use super::is_runnable;

fn effective_deadline(task: &Task) -> Option<u64> {
    if task.sched.deadline_ticks != 0 {
        Some(task.sched.deadline_ticks)
    } else if task.sched.period_ticks != 0 {
        Some(task.sched.last_scheduled_tick + task.sched.period_ticks as u64)
    } else {
        None
    }
}

pub fn pick_next(tasks: &mut [Task], _current: Option<Pid>, _cursor: usize, _now_tick: u64) -> Option<Pid> {
    let realtime_pick = tasks
        .iter()
        .filter(|t| is_runnable(t))
        .filter_map(|t| effective_deadline(t).map(|d| (d, t.pid)))
        .min_by_key(|&(deadline, _)| deadline)
        .map(|(_, pid)| pid);

    if realtime_pick.is_some() {
        return realtime_pick;
    }

    tasks
        .iter()
        .filter(|t| is_runnable(t) && effective_deadline(t).is_none())
        .min_by_key(|t| t.sched.last_scheduled_tick)
        .map(|t| t.pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessState, Task};

    fn periodic_task(pid: u32, deadline: u64) -> Task {
        let mut t = Task::test_slot();
        t.pid = Pid(pid);
        t.sched.deadline_ticks = deadline;
        t
    }

    #[test]
    fn picks_the_earliest_deadline() {
        let mut tasks = [periodic_task(1, 500), periodic_task(2, 100), periodic_task(3, 300)];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(2)));
    }

    #[test]
    fn rate_monotonic_shorter_period_wins_via_implicit_deadline() {
        let mut short = Task::test_slot();
        short.pid = Pid(1);
        short.sched.period_ticks = 10;
        let mut long = Task::test_slot();
        long.pid = Pid(2);
        long.sched.period_ticks = 100;
        let mut tasks = [short, long];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(1)));
    }

    #[test]
    fn best_effort_tasks_run_only_when_no_realtime_task_is_ready() {
        let mut rt = periodic_task(1, 50);
        rt.state = ProcessState::Zombie;
        let mut be1 = Task::test_slot();
        be1.pid = Pid(2);
        be1.sched.last_scheduled_tick = 20;
        let mut be2 = Task::test_slot();
        be2.pid = Pid(3);
        be2.sched.last_scheduled_tick = 5;
        let mut tasks = [rt, be1, be2];
        assert_eq!(pick_next(&mut tasks, None, 0, 0), Some(Pid(3)));
    }
}
