//! POSIX-family error codes surfaced to user space, plus the
//! kernel-internal error classification built on top of them.

/// Errno values a syscall can return, negated in the syscall return
/// register the way Linux does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    Eperm = 1,
    Enoent = 2,
    Esrch = 3,
    Eintr = 4,
    E2big = 7,
    Eagain = 11,
    Enomem = 12,
    Eacces = 13,
    Eexist = 17,
    Einval = 22,
    Erange = 34,
    Eidrm = 43,
}

impl Errno {
    /// Value to place in the syscall return register: `-errno`.
    pub const fn as_retval(self) -> i64 {
        -(self as i32 as i64)
    }
}

impl core::fmt::Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Errno::Eperm => "EPERM",
            Errno::Enoent => "ENOENT",
            Errno::Esrch => "ESRCH",
            Errno::Eintr => "EINTR",
            Errno::E2big => "E2BIG",
            Errno::Eagain => "EAGAIN",
            Errno::Enomem => "ENOMEM",
            Errno::Eacces => "EACCES",
            Errno::Eexist => "EEXIST",
            Errno::Einval => "EINVAL",
            Errno::Erange => "ERANGE",
            Errno::Eidrm => "EIDRM",
        };
        f.write_str(s)
    }
}

/// The kernel's error classes, collapsed into one type so every
/// fallible kernel-internal call has a single return type to thread
/// through one abstraction boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// Class 1: surfaced to user space as `errno`.
    Syscall(Errno),
    /// Class 2: must become a `SIGSEGV` on the faulting task, never an
    /// errno return.
    Segv,
    /// Class 4: allocation failure during COW/demand-paging resolution;
    /// the caller turns this into `Segv` for a user fault, or `Enomem`
    /// for an IPC-creation path.
    Oom,
}

impl From<Errno> for KernelError {
    fn from(e: Errno) -> Self {
        KernelError::Syscall(e)
    }
}

impl KernelError {
    /// Convert to the raw syscall return value. Only meaningful for
    /// `Syscall` and `Oom` — callers must route `Segv` through signal
    /// delivery instead of ever reaching here.
    pub fn as_retval(self) -> i64 {
        match self {
            KernelError::Syscall(e) => e.as_retval(),
            KernelError::Oom => Errno::Enomem.as_retval(),
            KernelError::Segv => {
                log::error!("KernelError::Segv reached the syscall boundary directly");
                Errno::Einval.as_retval()
            }
        }
    }
}

/// A kernel-invariant violation. Logs and halts; never returns.
/// Distinct from `panic!` only in that it names the invariant
/// explicitly in the log line.
#[track_caller]
pub fn kernel_bug(invariant: &str) -> ! {
    log::error!("kernel invariant violated: {invariant}");
    panic!("kernel invariant violated: {invariant}");
}
