//! System V message queues: FIFO + type-filtered `msgrcv`, byte/message
//! caps, blocking `msgsnd`/`msgrcv`.

use spin::Mutex;

use super::{IpcPerm, IPC_CREAT, IPC_EXCL};
use crate::errno::Errno;
use crate::process::wait_queue::{sleep_on, WakeReason, WaitQueue};
use crate::process::{Pid, ProcessState};

pub const MAX_QUEUES: usize = 16;
pub const MAX_MESSAGES: usize = 32;
pub const MAX_PAYLOAD: usize = 256;
pub const MSG_NOERROR: i32 = 0o10000;

#[derive(Clone, Copy)]
struct Message {
    used: bool,
    msg_type: i32,
    len: usize,
    payload: [u8; MAX_PAYLOAD],
}

impl Message {
    const fn empty() -> Self {
        Self { used: false, msg_type: 0, len: 0, payload: [0; MAX_PAYLOAD] }
    }
}

struct Queue {
    used: bool,
    perm: IpcPerm,
    messages: [Message; MAX_MESSAGES],
    /// FIFO arrival order, as indices into `messages`; `None` past `len`.
    order: [usize; MAX_MESSAGES],
    len: usize,
    byte_cap: usize,
    msg_cap: usize,
    bytes_used: usize,
    last_send_pid: u32,
    last_recv_pid: u32,
    send_queue: WaitQueue,
    recv_queue: WaitQueue,
}

impl Queue {
    const fn empty() -> Self {
        const EMPTY_MSG: Message = Message::empty();
        Self {
            used: false,
            perm: IpcPerm { key: 0, id: 0, uid: 0, gid: 0, cuid: 0, cgid: 0, mode: 0, dest: false },
            messages: [EMPTY_MSG; MAX_MESSAGES],
            order: [0; MAX_MESSAGES],
            len: 0,
            byte_cap: MAX_PAYLOAD * MAX_MESSAGES,
            msg_cap: MAX_MESSAGES,
            bytes_used: 0,
            last_send_pid: 0,
            last_recv_pid: 0,
            send_queue: WaitQueue::new(),
            recv_queue: WaitQueue::new(),
        }
    }
}

struct MsgTable {
    queues: [Queue; MAX_QUEUES],
    next_id: i32,
}

impl MsgTable {
    const fn new() -> Self {
        const EMPTY: Queue = Queue::empty();
        Self { queues: [EMPTY; MAX_QUEUES], next_id: 1 }
    }

    fn find_by_key(&self, key: i32) -> Option<usize> {
        self.queues.iter().position(|q| q.used && q.perm.key == key)
    }

    fn slot_of(&self, id: i32) -> Option<usize> {
        self.queues.iter().position(|q| q.used && q.perm.id == id)
    }
}

static QUEUES: Mutex<MsgTable> = Mutex::new(MsgTable::new());

/// `msgget(key, flags)`, mirroring the creation rules of `shmget`.
pub fn msgget(key: i32, flags: i32, uid: u32, gid: u32) -> Result<i32, Errno> {
    let mut table = QUEUES.lock();

    if key != 0 {
        if let Some(slot) = table.find_by_key(key) {
            if flags & IPC_CREAT != 0 && flags & IPC_EXCL != 0 {
                return Err(Errno::Eexist);
            }
            return Ok(table.queues[slot].perm.id);
        }
    }

    if flags & IPC_CREAT == 0 {
        return Err(Errno::Enoent);
    }

    let slot = table.queues.iter().position(|q| !q.used).ok_or(Errno::Enomem)?;
    let id = table.next_id;
    table.next_id += 1;

    let q = &mut table.queues[slot];
    *q = Queue::empty();
    q.used = true;
    q.perm = IpcPerm::new(key, id, uid, gid, (flags & 0o777) as u16);
    Ok(id)
}

fn find_match(queue: &Queue, want_type: i32) -> Option<usize> {
    let candidates = queue.order[..queue.len].iter().copied();
    if want_type == 0 {
        candidates.into_iter().next()
    } else if want_type > 0 {
        candidates.into_iter().find(|&i| queue.messages[i].msg_type == want_type)
    } else {
        candidates
            .into_iter()
            .filter(|&i| queue.messages[i].msg_type <= -want_type)
            .min_by_key(|&i| queue.messages[i].msg_type)
    }
}

/// `msgsnd(id, type, payload, flags)`.
pub fn msgsnd(id: i32, caller: Pid, msg_type: i32, payload: &[u8], nowait: bool) -> Result<(), Errno> {
    if msg_type == 0 || payload.len() > MAX_PAYLOAD {
        return Err(Errno::Einval);
    }
    loop {
        let mut table = QUEUES.lock();
        let slot = table.slot_of(id).ok_or(Errno::Einval)?;
        let q = &mut table.queues[slot];

        let fits = q.len < q.msg_cap && q.bytes_used + payload.len() <= q.byte_cap;
        if !fits {
            if nowait {
                return Err(Errno::Eagain);
            }
            let queue_ptr: *const WaitQueue = &q.send_queue;
            drop(table);
            let reason = unsafe { sleep_on(&*queue_ptr, caller, ProcessState::Interruptible) };
            match reason {
                WakeReason::Interrupted => return Err(Errno::Eintr),
                WakeReason::Woken => continue,
            }
        }

        let msg_slot = q.messages.iter().position(|m| !m.used).ok_or(Errno::Enomem)?;
        let m = &mut q.messages[msg_slot];
        m.used = true;
        m.msg_type = msg_type;
        m.len = payload.len();
        m.payload[..payload.len()].copy_from_slice(payload);

        q.order[q.len] = msg_slot;
        q.len += 1;
        q.bytes_used += payload.len();
        q.last_send_pid = caller.0;
        q.recv_queue.wake_all();
        return Ok(());
    }
}

/// `msgrcv(id, buf, size, type, flags)`, honoring the type filter.
pub fn msgrcv(id: i32, caller: Pid, buf: &mut [u8], want_type: i32, nowait: bool, no_error_on_truncate: bool) -> Result<(i32, usize), Errno> {
    loop {
        let mut table = QUEUES.lock();
        let slot = table.slot_of(id).ok_or(Errno::Einval)?;
        let q = &mut table.queues[slot];

        match find_match(q, want_type) {
            None => {
                if nowait {
                    return Err(Errno::Eagain);
                }
                let queue_ptr: *const WaitQueue = &q.recv_queue;
                drop(table);
                let reason = unsafe { sleep_on(&*queue_ptr, caller, ProcessState::Interruptible) };
                match reason {
                    WakeReason::Interrupted => return Err(Errno::Eintr),
                    WakeReason::Woken => continue,
                }
            }
            Some(msg_slot) => {
                let msg_type = q.messages[msg_slot].msg_type;
                let len = q.messages[msg_slot].len;
                if len > buf.len() && !no_error_on_truncate {
                    return Err(Errno::E2big);
                }
                let copy_len = len.min(buf.len());
                buf[..copy_len].copy_from_slice(&q.messages[msg_slot].payload[..copy_len]);

                q.messages[msg_slot].used = false;
                q.bytes_used -= len;
                let order_pos = q.order[..q.len].iter().position(|&i| i == msg_slot).unwrap();
                q.order.copy_within(order_pos + 1..q.len, order_pos);
                q.len -= 1;
                q.last_recv_pid = caller.0;
                q.send_queue.wake_one();

                return Ok((msg_type, copy_len));
            }
        }
    }
}

pub fn msgctl_rmid(id: i32) -> Result<(), Errno> {
    let mut table = QUEUES.lock();
    let slot = table.slot_of(id).ok_or(Errno::Einval)?;
    let q = &mut table.queues[slot];
    q.used = false;
    q.send_queue.wake_all();
    q.recv_queue.wake_all();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_zero_takes_first_in_fifo_order() {
        let id = msgget(0, IPC_CREAT, 0, 0).unwrap();
        msgsnd(id, Pid(1), 5, b"first", false).unwrap();
        msgsnd(id, Pid(1), 7, b"second", false).unwrap();
        let mut buf = [0u8; 16];
        let (t, n) = msgrcv(id, Pid(2), &mut buf, 0, false, false).unwrap();
        assert_eq!(t, 5);
        assert_eq!(&buf[..n], b"first");
        msgctl_rmid(id).unwrap();
    }

    #[test]
    fn negative_type_takes_smallest_type_at_or_below_bound() {
        let id = msgget(0, IPC_CREAT, 0, 0).unwrap();
        msgsnd(id, Pid(1), 5, b"five", false).unwrap();
        msgsnd(id, Pid(1), 2, b"two", false).unwrap();
        msgsnd(id, Pid(1), 9, b"nine", false).unwrap();
        let mut buf = [0u8; 16];
        let (t, n) = msgrcv(id, Pid(2), &mut buf, -5, false, false).unwrap();
        assert_eq!(t, 2);
        assert_eq!(&buf[..n], b"two");
        msgctl_rmid(id).unwrap();
    }

    #[test]
    fn rcv_on_empty_queue_without_wait_fails_eagain() {
        let id = msgget(0, IPC_CREAT, 0, 0).unwrap();
        let mut buf = [0u8; 16];
        let err = msgrcv(id, Pid(2), &mut buf, 0, true, false).unwrap_err();
        assert_eq!(err, Errno::Eagain);
        msgctl_rmid(id).unwrap();
    }
}
