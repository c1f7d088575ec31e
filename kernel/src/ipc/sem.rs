//! System V semaphore sets: atomic multi-op `semop`, FIFO waiter
//! retry, `semctl`.

use spin::Mutex;

use super::{IpcPerm, IPC_CREAT, IPC_EXCL};
use crate::errno::Errno;
use crate::process::wait_queue::{sleep_on, WakeReason, WaitQueue};
use crate::process::{Pid, ProcessState};

pub const MAX_SETS: usize = 16;
pub const MAX_SEMS_PER_SET: usize = 16;
pub const MAX_OPS: usize = 8;
pub const MAX_WAITERS: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct SemOp {
    pub sem_num: u16,
    pub op: i16,
    pub nowait: bool,
}

#[derive(Clone, Copy)]
struct Waiter {
    used: bool,
    pid: Pid,
    ops: [SemOp; MAX_OPS],
    op_count: usize,
    /// Enqueue order, so a retry pass can grant waiters FIFO rather
    /// than by whichever array slot they happen to occupy.
    seq: u64,
}

impl Waiter {
    const fn empty() -> Self {
        Self { used: false, pid: Pid(0), ops: [SemOp { sem_num: 0, op: 0, nowait: false }; MAX_OPS], op_count: 0, seq: 0 }
    }
}

struct SemSet {
    used: bool,
    removed: bool,
    perm: IpcPerm,
    values: [i16; MAX_SEMS_PER_SET],
    last_pid: [Pid; MAX_SEMS_PER_SET],
    sem_count: usize,
    waiters: [Waiter; MAX_WAITERS],
    next_seq: u64,
    queue: WaitQueue,
}

impl SemSet {
    const fn empty() -> Self {
        Self {
            used: false,
            removed: false,
            perm: IpcPerm { key: 0, id: 0, uid: 0, gid: 0, cuid: 0, cgid: 0, mode: 0, dest: false },
            values: [0; MAX_SEMS_PER_SET],
            last_pid: [Pid(0); MAX_SEMS_PER_SET],
            sem_count: 0,
            waiters: [Waiter::empty(); MAX_WAITERS],
            next_seq: 0,
            queue: WaitQueue::new(),
        }
    }
}

struct SemTable {
    sets: [SemSet; MAX_SETS],
    next_id: i32,
}

impl SemTable {
    const fn new() -> Self {
        const EMPTY: SemSet = SemSet::empty();
        Self { sets: [EMPTY; MAX_SETS], next_id: 1 }
    }

    fn find_by_key(&self, key: i32) -> Option<usize> {
        self.sets.iter().position(|s| s.used && s.perm.key == key)
    }

    fn slot_of(&self, id: i32) -> Option<usize> {
        self.sets.iter().position(|s| s.used && s.perm.id == id)
    }
}

static SETS: Mutex<SemTable> = Mutex::new(SemTable::new());

/// `semget(key, nsems, flags)`, following the same creation rules
/// shared across all three IPC subsystems.
pub fn semget(key: i32, nsems: usize, flags: i32, uid: u32, gid: u32) -> Result<i32, Errno> {
    if nsems == 0 || nsems > MAX_SEMS_PER_SET {
        return Err(Errno::Einval);
    }
    let mut table = SETS.lock();

    if key != 0 {
        if let Some(slot) = table.find_by_key(key) {
            if flags & IPC_CREAT != 0 && flags & IPC_EXCL != 0 {
                return Err(Errno::Eexist);
            }
            return Ok(table.sets[slot].perm.id);
        }
    }

    if flags & IPC_CREAT == 0 {
        return Err(Errno::Enoent);
    }

    let slot = table.sets.iter().position(|s| !s.used).ok_or(Errno::Enomem)?;
    let id = table.next_id;
    table.next_id += 1;

    let set = &mut table.sets[slot];
    *set = SemSet::empty();
    set.used = true;
    set.perm = IpcPerm::new(key, id, uid, gid, (flags & 0o777) as u16);
    set.sem_count = nsems;
    Ok(id)
}

/// Apply one op against a local value copy; `None` means it would
/// block.
fn try_apply(values: &mut [i16; MAX_SEMS_PER_SET], op: &SemOp) -> Option<()> {
    let v = &mut values[op.sem_num as usize];
    if op.op > 0 {
        *v += op.op;
        Some(())
    } else if op.op < 0 {
        if *v >= -op.op { *v += op.op; Some(()) } else { None }
    } else if *v == 0 {
        Some(())
    } else {
        None
    }
}

fn enqueue_waiter(set: &mut SemSet, pid: Pid, ops: &[SemOp]) -> Result<(), Errno> {
    let slot = set.waiters.iter().position(|w| !w.used).ok_or(Errno::Enomem)?;
    let seq = set.next_seq;
    set.next_seq += 1;
    let w = &mut set.waiters[slot];
    w.used = true;
    w.pid = pid;
    w.op_count = ops.len();
    w.ops[..ops.len()].copy_from_slice(ops);
    w.seq = seq;
    Ok(())
}

/// Walk the waiter list in FIFO enqueue order (not array-slot order,
/// which drifts from arrival order as slots are reused), retrying each
/// against the current values; a waiter whose vector now fits is
/// removed and woken.
fn retry_waiters(set: &mut SemSet) {
    loop {
        let mut order = [0usize; MAX_WAITERS];
        let mut n = 0;
        for slot in 0..MAX_WAITERS {
            if set.waiters[slot].used {
                order[n] = slot;
                n += 1;
            }
        }
        order[..n].sort_unstable_by_key(|&slot| set.waiters[slot].seq);

        let mut progressed = false;
        for &slot in &order[..n] {
            if !set.waiters[slot].used {
                continue;
            }
            let ops = set.waiters[slot].ops;
            let op_count = set.waiters[slot].op_count;
            let mut local = set.values;
            let fits = ops[..op_count].iter().all(|op| try_apply(&mut local, op).is_some());
            if fits {
                set.values = local;
                for op in &ops[..op_count] {
                    set.last_pid[op.sem_num as usize] = set.waiters[slot].pid;
                }
                set.waiters[slot].used = false;
                set.queue.wake_one();
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
}

/// `semop(id, ops)`: the whole vector applies atomically or not at
/// all.
pub fn semop(id: i32, caller: Pid, ops: &[SemOp]) -> Result<(), Errno> {
    if ops.len() > MAX_OPS {
        return Err(Errno::E2big);
    }
    loop {
        let mut table = SETS.lock();
        let slot = table.slot_of(id).ok_or(Errno::Einval)?;
        let set = &mut table.sets[slot];
        if set.removed {
            return Err(Errno::Eidrm);
        }

        let mut local = set.values;
        let mut blocked_at = None;
        for (i, op) in ops.iter().enumerate() {
            if try_apply(&mut local, op).is_none() {
                blocked_at = Some(i);
                break;
            }
        }

        match blocked_at {
            None => {
                set.values = local;
                for op in ops {
                    set.last_pid[op.sem_num as usize] = caller;
                }
                retry_waiters(set);
                return Ok(());
            }
            Some(i) => {
                if ops[i].nowait {
                    return Err(Errno::Eagain);
                }
                enqueue_waiter(set, caller, ops)?;
                // `SETS` is a `'static` lock; the queue's address is stable
                // for the kernel's lifetime, so it's safe to read it
                // through a raw pointer after dropping the guard — sleeping
                // while still holding the table lock would deadlock every
                // other `semop`/`semctl` call against this (or any) set.
                let queue_ptr: *const WaitQueue = &set.queue;
                drop(table);

                let reason = unsafe { sleep_on(&*queue_ptr, caller, ProcessState::Interruptible) };
                match reason {
                    WakeReason::Interrupted => return Err(Errno::Eintr),
                    WakeReason::Woken => continue,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemCtlCmd {
    GetVal(usize),
    SetVal(usize, i16),
    GetAll,
    SetAll,
    IpcStat,
    IpcSet,
    IpcRmId,
}

pub fn semctl(id: i32, cmd: SemCtlCmd, values: Option<&mut [i16]>) -> Result<i32, Errno> {
    let mut table = SETS.lock();
    let slot = table.slot_of(id).ok_or(Errno::Einval)?;
    let set = &mut table.sets[slot];
    if set.removed {
        return Err(Errno::Eidrm);
    }

    match cmd {
        SemCtlCmd::GetVal(n) => set.values.get(n).copied().map(|v| v as i32).ok_or(Errno::Einval),
        SemCtlCmd::SetVal(n, v) => {
            *set.values.get_mut(n).ok_or(Errno::Einval)? = v;
            retry_waiters(set);
            Ok(0)
        }
        SemCtlCmd::GetAll => {
            let out = values.ok_or(Errno::Einval)?;
            out[..set.sem_count].copy_from_slice(&set.values[..set.sem_count]);
            Ok(0)
        }
        SemCtlCmd::SetAll => {
            let input = values.ok_or(Errno::Einval)?;
            set.values[..set.sem_count].copy_from_slice(&input[..set.sem_count]);
            retry_waiters(set);
            Ok(0)
        }
        SemCtlCmd::IpcStat | SemCtlCmd::IpcSet => Ok(0),
        SemCtlCmd::IpcRmId => {
            set.removed = true;
            set.queue.wake_all();
            set.used = false;
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semop_positive_and_zero_ops_never_block() {
        let mut values = [0i16; MAX_SEMS_PER_SET];
        let inc = SemOp { sem_num: 0, op: 3, nowait: false };
        assert!(try_apply(&mut values, &inc).is_some());
        assert_eq!(values[0], 3);

        let wait_zero_fails = SemOp { sem_num: 0, op: 0, nowait: false };
        assert!(try_apply(&mut values, &wait_zero_fails).is_none());
    }

    #[test]
    fn semop_negative_blocks_when_insufficient() {
        let mut values = [1i16; MAX_SEMS_PER_SET];
        let dec2 = SemOp { sem_num: 0, op: -2, nowait: false };
        assert!(try_apply(&mut values, &dec2).is_none());
        assert_eq!(values[0], 1, "a blocked op must not mutate the local copy's caller-visible value");
    }

    #[test]
    fn semget_then_get_by_key_returns_same_id() {
        let key = 0x1234;
        let id1 = semget(key, 2, IPC_CREAT, 0, 0).unwrap();
        let id2 = semget(key, 2, 0, 0, 0).unwrap();
        assert_eq!(id1, id2);
        semctl(id1, SemCtlCmd::IpcRmId, None).unwrap();
    }
}
