//! Wait queue: a list head plus a spin-lock. Built directly on
//! `crate::list`.

use core::ptr::NonNull;

use spin::Mutex;

use crate::list::List;
use super::{Pid, ProcessState, TASKS};

pub struct WaitQueue {
    inner: Mutex<List>,
}

/// Outcome of `sleep_on`: either woken normally, or cancelled by a
/// signal.
#[derive(Debug, PartialEq, Eq)]
pub enum WakeReason {
    Woken,
    Interrupted,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { inner: Mutex::new(List::new()) }
    }

    /// Atomically transition `pid` to `state` and enqueue it: the task
    /// moves from running to interruptible/uninterruptible and lands
    /// on exactly one queue.
    ///
    /// # Safety
    /// `pid` must name a task whose `queue_link` is not already linked
    /// into any other queue, and the task must outlive its time here.
    pub unsafe fn enqueue(&self, pid: Pid, state: ProcessState) {
        let mut table = TASKS.lock();
        let Some(slot) = table.tasks.iter().position(|t| t.slot_used && t.pid == pid) else {
            return;
        };
        table.tasks[slot].state = state;
        table.tasks[slot].sleep_queue = Some(self as *const WaitQueue);
        let link = NonNull::from(&table.tasks[slot].queue_link);
        drop(table);
        self.inner.lock().push_back(link);
    }

    /// Wake one task: dequeue the head, mark it runnable. Used for
    /// `exclusive` wake semantics.
    pub fn wake_one(&self) -> Option<Pid> {
        let node = unsafe { self.inner.lock().pop_front() }?;
        Some(mark_runnable(node))
    }

    /// Wake every task currently parked here (non-exclusive semantics).
    pub fn wake_all(&self) {
        let mut queue = self.inner.lock();
        while let Some(node) = unsafe { queue.pop_front() } {
            mark_runnable(node);
        }
    }

    /// Remove a specific task before it's woken (cancellation path).
    ///
    /// # Safety
    /// `pid`'s `queue_link` must currently be linked into this queue.
    pub unsafe fn remove(&self, pid: Pid) {
        let table = TASKS.lock();
        if let Some(task) = table.tasks.iter().find(|t| t.slot_used && t.pid == pid) {
            let link = NonNull::from(&task.queue_link);
            drop(table);
            self.inner.lock().remove(link);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn mark_runnable(node: NonNull<crate::list::Link>) -> Pid {
    let mut table = TASKS.lock();
    let slot = table
        .tasks
        .iter()
        .position(|t| t.slot_used && NonNull::from(&t.queue_link) == node)
        .unwrap_or_else(|| crate::errno::kernel_bug("wait queue node with no owning task"));
    table.tasks[slot].state = ProcessState::Running;
    table.tasks[slot].sleep_queue = None;
    table.tasks[slot].pid
}

/// Park the current task on `queue` in `state`, yield to the
/// scheduler, and report whether the wake was a real wake or a
/// signal-driven cancellation.
///
/// # Safety
/// Must be called from the task's own execution context (i.e. `pid`
/// is genuinely the running task about to give up the CPU).
pub unsafe fn sleep_on(queue: &WaitQueue, pid: Pid, state: ProcessState) -> WakeReason {
    queue.enqueue(pid, state);
    super::scheduler::yield_cpu();

    let interrupted = super::with_task(pid, |t| {
        let was = t.signals.interrupted;
        t.signals.interrupted = false;
        was
    })
    .unwrap_or(false);

    if interrupted {
        WakeReason::Interrupted
    } else {
        WakeReason::Woken
    }
}

/// Cancel a sleeper: remove it from `queue`, mark it runnable, and
/// flag the wake as signal-interrupted.
pub unsafe fn interrupt_sleeper(queue: &WaitQueue, pid: Pid) {
    queue.remove(pid);
    super::with_task(pid, |t| {
        t.state = ProcessState::Running;
        t.signals.interrupted = true;
        t.sleep_queue = None;
    });
}

/// Wake one specific parked task out of order, rather than whichever
/// task happens to be at the queue head. Used where an external event
/// (a deadline, not another task's action) names exactly who woke up.
///
/// # Safety
/// `pid` must currently be parked on `queue`.
pub unsafe fn wake_specific(queue: &WaitQueue, pid: Pid) {
    queue.remove(pid);
    super::with_task(pid, |t| {
        t.state = ProcessState::Running;
        t.sleep_queue = None;
    });
}

/// If `pid` is currently parked on some wait queue, cancel that sleep
/// immediately instead of waiting for the queue's own event. Called
/// after a signal is raised against a task that might be sleeping,
/// without the raiser needing to know which queue that is.
pub fn interrupt_if_sleeping(pid: Pid) {
    let queue_ptr = super::with_task(pid, |t| t.sleep_queue).flatten();
    if let Some(ptr) = queue_ptr {
        unsafe { interrupt_sleeper(&*ptr, pid) };
    }
}
