//! Task table.
//!
//! Tasks live in a fixed-size arena and are addressed by `Pid`, never
//! by owning reference, so parent/child links (inherently cyclic) are
//! plain index rewrites rather than something the borrow checker has
//! to be talked around.

pub mod context;
pub mod scheduler;
pub mod signal;
pub mod sleep;
pub mod syscall;
pub mod trapframe;
pub mod wait_queue;

use spin::Mutex;

use crate::list::Link;
use crate::memory::address_space::AddressSpace;
use context::Context;
use signal::SignalState;

pub const MAX_TASKS: usize = 64;
pub const PID_INIT: Pid = Pid(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Interruptible,
    Uninterruptible,
    Stopped,
    Traced,
    Zombie,
    Dead,
}

/// Scheduling attributes shared by every policy; unused fields for a
/// given build's active policy simply sit idle rather than forking the
/// `Task` type per policy.
#[derive(Debug, Clone, Copy)]
pub struct SchedAttrs {
    pub nice: i8,
    pub static_priority: u8,
    pub dynamic_priority: u8,
    pub vruntime: u64,
    pub period_ticks: u32,
    pub deadline_ticks: u64,
    pub wcet_ticks: u32,
    pub run_ticks: u64,
    pub last_scheduled_tick: u64,
}

impl SchedAttrs {
    pub const fn default_for_nice(nice: i8) -> Self {
        Self {
            nice,
            static_priority: 20,
            dynamic_priority: 20,
            vruntime: 0,
            period_ticks: 0,
            deadline_ticks: 0,
            wcet_ticks: 0,
            run_ticks: 0,
            last_scheduled_tick: 0,
        }
    }
}

pub struct Task {
    pub pid: Pid,
    pub parent: Pid,
    pub pgid: Pid,
    pub uid: u32,
    pub gid: u32,
    pub state: ProcessState,
    pub sched: SchedAttrs,
    pub address_space: Option<AddressSpace>,
    pub context: Context,
    pub signals: SignalState,
    pub exit_status: i32,
    pub name: [u8; 16],
    /// Embedded intrusive node: a task is on at most one run/wait queue
    /// at a time.
    pub queue_link: Link,
    /// The wait queue this task is currently parked on, if any — set by
    /// `wait_queue::enqueue`, cleared on any wake. Lets a signal raised
    /// against a sleeping task find and cancel its sleep without the
    /// raiser needing to already know which queue that is.
    pub sleep_queue: Option<*const wait_queue::WaitQueue>,
    slot_used: bool,
}

// Every access to a `Task` goes through `TASKS`'s spinlock on this
// single-core kernel; `sleep_queue` pointing at a `'static` queue never
// outlives the kernel itself.
unsafe impl Send for Task {}

impl Task {
    const fn empty() -> Self {
        Self {
            pid: Pid(0),
            parent: Pid(0),
            pgid: Pid(0),
            uid: 0,
            gid: 0,
            state: ProcessState::Dead,
            sched: SchedAttrs::default_for_nice(0),
            address_space: None,
            context: Context::empty(),
            signals: SignalState::new(),
            exit_status: 0,
            name: [0; 16],
            queue_link: Link::new(),
            sleep_queue: None,
            slot_used: false,
        }
    }

    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        let len = bytes.len().min(self.name.len());
        self.name[..len].copy_from_slice(&bytes[..len]);
        self.name[len..].fill(0);
    }

    /// A slot-used, runnable-by-default task for scheduler-policy unit
    /// tests, which exercise `pick_next` against bare arrays of `Task`
    /// rather than the real `TASKS` table.
    #[cfg(test)]
    pub(crate) fn test_slot() -> Self {
        let mut t = Self::empty();
        t.slot_used = true;
        t.state = ProcessState::Running;
        t
    }
}

struct TaskTable {
    tasks: [Task; MAX_TASKS],
    next_pid: u32,
}

impl TaskTable {
    const fn new() -> Self {
        const EMPTY: Task = Task::empty();
        Self { tasks: [EMPTY; MAX_TASKS], next_pid: 1 }
    }

    fn slot_of(&self, pid: Pid) -> Option<usize> {
        self.tasks.iter().position(|t| t.slot_used && t.pid == pid)
    }
}

pub static TASKS: Mutex<TaskTable> = Mutex::new(TaskTable::new());

/// Parked `waitpid` callers wake here whenever any task exits, then
/// recheck `find_zombie_child` themselves rather than being told which
/// child to look for.
pub static CHILD_EXIT_QUEUE: wait_queue::WaitQueue = wait_queue::WaitQueue::new();

/// Allocate a new task slot with `parent` already recorded. Fails if
/// the table is full (ENOMEM at the syscall boundary).
pub fn spawn(parent: Pid, address_space: Option<AddressSpace>, context: Context, nice: i8) -> Option<Pid> {
    let mut table = TASKS.lock();
    let pid = Pid(table.next_pid);
    table.next_pid += 1;

    let slot = table.tasks.iter().position(|t| !t.slot_used)?;
    let task = &mut table.tasks[slot];
    *task = Task::empty();
    task.pid = pid;
    task.parent = parent;
    task.pgid = parent;
    task.state = ProcessState::Running;
    task.sched = SchedAttrs::default_for_nice(nice);
    task.address_space = address_space;
    task.context = context;
    task.slot_used = true;
    Some(pid)
}

pub fn with_task<R>(pid: Pid, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
    let mut table = TASKS.lock();
    let slot = table.slot_of(pid)?;
    Some(f(&mut table.tasks[slot]))
}

/// Transition `pid` to zombie and re-parent its children to pid 1.
pub fn exit(pid: Pid, status: i32) {
    let mut table = TASKS.lock();
    if let Some(slot) = table.slot_of(pid) {
        table.tasks[slot].state = ProcessState::Zombie;
        table.tasks[slot].exit_status = status;
    }
    for task in table.tasks.iter_mut() {
        if task.slot_used && task.parent == pid {
            task.parent = PID_INIT;
        }
    }
    drop(table);
    CHILD_EXIT_QUEUE.wake_all();
}

/// Reclaim a zombie's slot once its parent has reaped it via `waitpid`.
pub fn reap(pid: Pid) {
    let mut table = TASKS.lock();
    if let Some(slot) = table.slot_of(pid) {
        table.tasks[slot] = Task::empty();
    }
}

/// Find the first zombie child of `parent` matching `filter_pid`
/// (`None` = any child). Used by `waitpid`.
pub fn find_zombie_child(parent: Pid, filter_pid: Option<Pid>) -> Option<(Pid, i32)> {
    let table = TASKS.lock();
    table
        .tasks
        .iter()
        .find(|t| {
            t.slot_used
                && t.parent == parent
                && t.state == ProcessState::Zombie
                && filter_pid.map_or(true, |p| p == t.pid)
        })
        .map(|t| (t.pid, t.exit_status))
}

pub fn has_children(parent: Pid) -> bool {
    let table = TASKS.lock();
    table.tasks.iter().any(|t| t.slot_used && t.parent == parent)
}
