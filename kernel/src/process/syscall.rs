//! The `int 0x80` syscall adapter: a naked entry stub builds a
//! `TrapFrame` exactly like any other trap, then `dispatch` converts
//! its Linux-style register
//! convention (`eax`=number, `ebx,ecx,edx,esi,edi,ebp`=args 1-6) into
//! typed calls against the scheduler, signal, and IPC subsystems.

use super::trapframe::TrapFrame;
use super::{Pid, ProcessState};
use crate::errno::Errno;
use crate::ipc::{msg, sem, shm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Fork,
    Vfork,
    Execve,
    Exit,
    Waitpid,
    Kill,
    Sigaction,
    Sigprocmask,
    Nanosleep,
    Brk,
    Semget,
    Semop,
    Semctl,
    Shmget,
    Shmat,
    Shmdt,
    Shmctl,
    Msgget,
    Msgsnd,
    Msgrcv,
    Msgctl,
}

impl Syscall {
    fn from_i32(n: i32) -> Option<Self> {
        Some(match n {
            2 => Self::Fork,
            190 => Self::Vfork,
            11 => Self::Execve,
            1 => Self::Exit,
            7 => Self::Waitpid,
            37 => Self::Kill,
            67 => Self::Sigaction,
            126 => Self::Sigprocmask,
            162 => Self::Nanosleep,
            45 => Self::Brk,
            64 => Self::Semget,
            65 => Self::Semop,
            66 => Self::Semctl,
            29 => Self::Shmget,
            30 => Self::Shmat,
            32 => Self::Shmdt,
            31 => Self::Shmctl,
            68 => Self::Msgget,
            69 => Self::Msgsnd,
            70 => Self::Msgrcv,
            71 => Self::Msgctl,
            _ => None?,
        })
    }
}

/// Entry point wired into the IDT at `SYSCALL_VECTOR` (dpl=3). Builds a
/// `TrapFrame` on the kernel stack and hands it to `dispatch`, the same
/// shape every other trap handler produces: `push err_code; push
/// vector; pusha` puts the frame in the exact layout `TrapFrame`
/// expects, regardless of which trap it came from.
#[unsafe(naked)]
pub unsafe extern "C" fn syscall_entry() {
    core::arch::naked_asm!(
        "push 0",    // err_code placeholder: software interrupts push none
        "push 0x80", // vector
        "pusha",
        "push esp",
        "call {dispatch}",
        "add esp, 4",
        "popa",
        "add esp, 8",
        "iretd",
        dispatch = sym dispatch,
    );
}

extern "C" fn dispatch(frame: *mut TrapFrame) {
    let frame = unsafe { &mut *frame };
    let result = run(frame);
    frame.set_return_value(result);
}

fn current_pid() -> Pid {
    super::scheduler::current().unwrap_or_else(|| crate::errno::kernel_bug("syscall trap with no running task"))
}

fn run(frame: &mut TrapFrame) -> i32 {
    let Some(call) = Syscall::from_i32(frame.eax as i32) else {
        return Errno::Einval.as_retval() as i32;
    };
    let pid = current_pid();
    let (a1, a2, a3, a4) = (frame.ebx, frame.ecx, frame.edx, frame.esi);

    let result: Result<i32, Errno> = match call {
        Syscall::Exit => {
            super::exit(pid, a1 as i32);
            super::scheduler::yield_cpu();
            Ok(0)
        }
        Syscall::Waitpid => sys_waitpid(pid, a1 as i32, a2),
        Syscall::Kill => sys_kill(a1 as i32, a2),
        Syscall::Sigaction => sys_sigaction(pid, a1, a2),
        Syscall::Sigprocmask => sys_sigprocmask(pid, a1),
        Syscall::Nanosleep => sys_nanosleep(pid, a1),
        // No separate heap-break region modeled in this core (anonymous
        // VMAs cover demand-paged growth instead); see DESIGN.md.
        Syscall::Brk => Ok(0),
        // vfork shares the fork_cow path rather than sharing the
        // parent's address space outright, since nothing here relies
        // on the "child must exec/exit before parent resumes" contract
        // real vfork makes; see DESIGN.md.
        Syscall::Fork | Syscall::Vfork => sys_fork(pid, frame),
        // execve needs a process-image loader and the VFS backing it,
        // neither of which exists here; see DESIGN.md.
        Syscall::Execve => Err(Errno::Enoent),
        Syscall::Semget => sem::semget(a1 as i32, a2 as usize, a3 as i32, 0, 0),
        Syscall::Semop => sys_semop(pid, a1 as i32, a2, a3 as usize),
        Syscall::Semctl => sys_semctl(a1 as i32, a2 as usize, a3 as i32, a4),
        Syscall::Shmget => shm::shmget(a1 as i32, a2 as usize, a3 as i32, 0, 0),
        Syscall::Shmat => sys_shmat(pid, a1 as i32, a2),
        Syscall::Shmdt => sys_shmdt(pid, a1),
        Syscall::Shmctl => sys_shmctl(a1 as i32, a2 as i32),
        Syscall::Msgget => msg::msgget(a1 as i32, a2 as i32, 0, 0),
        Syscall::Msgsnd => sys_msgsnd(pid, a1 as i32, a2, a3 as usize, a4),
        Syscall::Msgrcv => sys_msgrcv(pid, a1 as i32, a2, a3 as usize, a4 as i32),
        Syscall::Msgctl => msg::msgctl_rmid(a1 as i32).map(|()| 0),
    };

    match result {
        Ok(v) => v,
        Err(e) => e.as_retval() as i32,
    }
}

/// Build a COW-forked child address space and kernel stack, splice a
/// copy of the caller's own trap frame (with `eax` zeroed) onto the
/// top of that stack, and spawn a task that resumes straight into it.
/// See `context::Context::new_forked` for how the resume actually
/// replays the syscall-return path instead of starting fresh.
fn sys_fork(caller: Pid, frame: &TrapFrame) -> Result<i32, Errno> {
    let forked = super::with_task(caller, |t| t.address_space.as_ref().map(|space| space.fork_cow()))
        .ok_or(Errno::Esrch)?
        .ok_or(Errno::Einval)?
        .map_err(|_| Errno::Enomem)?;

    const STACK_PAGES: usize = 4;
    let stack_frame = crate::memory::frame::alloc_pages(STACK_PAGES).ok_or(Errno::Enomem)?;
    let stack_top = crate::memory::phys_to_virt(stack_frame.start_address()) + (STACK_PAGES * 4096) as u32;
    let frame_addr = stack_top - core::mem::size_of::<TrapFrame>() as u32;

    unsafe {
        let child_frame = &mut *(frame_addr as *mut TrapFrame);
        *child_frame = *frame;
        child_frame.set_return_value(0);
    }

    let context = super::context::Context::new_forked(frame_addr);
    super::spawn(caller, Some(forked), context, 0).map(|pid| pid.0 as i32).ok_or(Errno::Eagain)
}

fn sys_waitpid(caller: Pid, target: i32, status_ptr: u32) -> Result<i32, Errno> {
    let filter = if target > 0 { Some(Pid(target as u32)) } else { None };
    loop {
        if let Some((child_pid, status)) = super::find_zombie_child(caller, filter) {
            if status_ptr != 0 {
                unsafe { core::ptr::write(status_ptr as *mut i32, status) };
            }
            super::reap(child_pid);
            return Ok(child_pid.0 as i32);
        }
        if !super::has_children(caller) {
            return Err(Errno::Esrch);
        }
        match unsafe { super::wait_queue::sleep_on(&super::CHILD_EXIT_QUEUE, caller, ProcessState::Interruptible) } {
            super::wait_queue::WakeReason::Interrupted => return Err(Errno::Eintr),
            super::wait_queue::WakeReason::Woken => continue,
        }
    }
}

fn sys_kill(target: i32, signal: u32) -> Result<i32, Errno> {
    let pid = Pid(target as u32);
    super::with_task(pid, |t| t.signals.raise(signal)).ok_or(Errno::Esrch)?;
    super::wait_queue::interrupt_if_sleeping(pid);
    Ok(0)
}

fn sys_sigaction(pid: Pid, signal: u32, handler_addr: u32) -> Result<i32, Errno> {
    use super::signal::Disposition;
    let disposition = match handler_addr {
        0 => Disposition::Default,
        1 => Disposition::Ignore,
        addr => Disposition::Handler(addr),
    };
    super::with_task(pid, |t| t.signals.set_disposition(signal, disposition)).ok_or(Errno::Esrch)?;
    Ok(0)
}

fn sys_sigprocmask(pid: Pid, mask: u32) -> Result<i32, Errno> {
    let old = super::with_task(pid, |t| {
        let old = t.signals.blocked_mask();
        t.signals.set_blocked_mask(mask);
        old
    })
    .ok_or(Errno::Esrch)?;
    Ok(old as i32)
}

fn sys_nanosleep(pid: Pid, millis: u32) -> Result<i32, Errno> {
    let deadline = crate::clock::deadline_after(millis as u64);
    match super::sleep::sleep_until(pid, deadline) {
        super::wait_queue::WakeReason::Interrupted => Err(Errno::Eintr),
        super::wait_queue::WakeReason::Woken => Ok(0),
    }
}

fn sys_semop(pid: Pid, id: i32, ops_ptr: u32, count: usize) -> Result<i32, Errno> {
    if count > sem::MAX_OPS {
        return Err(Errno::E2big);
    }
    let raw = unsafe { core::slice::from_raw_parts(ops_ptr as *const sem::SemOp, count) };
    sem::semop(id, pid, raw).map(|()| 0)
}

fn sys_semctl(id: i32, sem_num: usize, cmd: i32, arg: u32) -> Result<i32, Errno> {
    use sem::SemCtlCmd;
    let cmd = match cmd {
        0 => SemCtlCmd::GetVal(sem_num),
        1 => SemCtlCmd::SetVal(sem_num, arg as i16),
        2 => SemCtlCmd::GetAll,
        3 => SemCtlCmd::SetAll,
        crate::ipc::IPC_STAT => SemCtlCmd::IpcStat,
        crate::ipc::IPC_SET => SemCtlCmd::IpcSet,
        crate::ipc::IPC_RMID => SemCtlCmd::IpcRmId,
        _ => return Err(Errno::Einval),
    };
    sem::semctl(id, cmd, None)
}

fn sys_shmat(pid: Pid, id: i32, addr: u32) -> Result<i32, Errno> {
    let outcome = super::with_task(pid, |t| {
        let space = t.address_space.as_mut().ok_or(Errno::Esrch)?;
        shm::shmat(id, space, addr, pid.0)
    })
    .ok_or(Errno::Esrch)?;
    outcome.map(|v| v as i32)
}

fn sys_shmdt(pid: Pid, addr: u32) -> Result<i32, Errno> {
    let outcome = super::with_task(pid, |t| {
        let space = t.address_space.as_mut().ok_or(Errno::Esrch)?;
        shm::shmdt(addr, space, pid.0)
    })
    .ok_or(Errno::Esrch)?;
    outcome.map(|()| 0)
}

fn sys_shmctl(id: i32, cmd: i32) -> Result<i32, Errno> {
    use shm::ShmCtlCmd;
    let cmd = match cmd {
        crate::ipc::IPC_STAT => ShmCtlCmd::IpcStat,
        crate::ipc::IPC_SET => ShmCtlCmd::IpcSet,
        crate::ipc::IPC_RMID => ShmCtlCmd::IpcRmId,
        _ => return Err(Errno::Einval),
    };
    shm::shmctl(id, cmd).map(|()| 0)
}

fn sys_msgsnd(pid: Pid, id: i32, header_ptr: u32, len: usize, flags: u32) -> Result<i32, Errno> {
    if len > msg::MAX_PAYLOAD {
        return Err(Errno::E2big);
    }
    let msg_type = unsafe { *(header_ptr as *const i32) };
    let payload = unsafe { core::slice::from_raw_parts((header_ptr + 4) as *const u8, len) };
    msg::msgsnd(id, pid, msg_type, payload, flags & crate::ipc::IPC_NOWAIT as u32 != 0).map(|()| 0)
}

fn sys_msgrcv(pid: Pid, id: i32, buf_ptr: u32, len: usize, want_type: i32) -> Result<i32, Errno> {
    let buf = unsafe { core::slice::from_raw_parts_mut(buf_ptr as *mut u8, len) };
    msg::msgrcv(id, pid, buf, want_type, false, false).map(|(_, n)| n as i32)
}
