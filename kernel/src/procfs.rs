//! `/proc/<pid>/{cmdline,stat}` formatting: a read-only procfs mirror
//! of task fields. No VFS here — `create_file`/the read handler
//! plumbing is external to this kernel; this module only formats the
//! bytes a VFS read handler would hand back.

use core::fmt::Write;

use crate::process::{Pid, ProcessState};

const MAX_LINE: usize = 256;

fn state_char(state: ProcessState) -> char {
    match state {
        ProcessState::Running => 'R',
        ProcessState::Interruptible => 'S',
        ProcessState::Uninterruptible => 'D',
        ProcessState::Stopped => 'T',
        ProcessState::Traced => 't',
        ProcessState::Zombie => 'Z',
        ProcessState::Dead => 'X',
    }
}

/// A fixed-capacity line buffer: procfs reads never allocate, matching
/// every other subsystem's no-heap design.
pub struct Line {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl Line {
    fn new() -> Self {
        Self { buf: [0; MAX_LINE], len: 0 }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let room = self.buf.len() - self.len;
        let n = bytes.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&bytes[..n]);
        self.len += n;
        Ok(())
    }
}

/// `/proc/<pid>/cmdline`: just the task's recorded name, NUL-terminated
/// per the real procfs convention (there being no argv array to join
/// without a loaded process image).
pub fn cmdline(pid: Pid) -> Option<Line> {
    crate::process::with_task(pid, |t| {
        let mut line = Line::new();
        let name_len = t.name.iter().position(|&b| b == 0).unwrap_or(t.name.len());
        let name = core::str::from_utf8(&t.name[..name_len]).unwrap_or("");
        let _ = write!(line, "{name}\0");
        line
    })
}

/// `/proc/<pid>/stat`: fields 1-52 of `proc(5)`, space-separated, a
/// single trailing `\n`. Only the fields this kernel actually tracks
/// are meaningful; everything else is the fixed placeholder `0` in its
/// field position so field-counting tools that expect exactly 52
/// columns still work.
pub fn stat(pid: Pid) -> Option<Line> {
    crate::process::with_task(pid, |t| {
        let mut line = Line::new();
        let name_len = t.name.iter().position(|&b| b == 0).unwrap_or(t.name.len());
        let comm = core::str::from_utf8(&t.name[..name_len]).unwrap_or("");

        // 1 pid, 2 comm, 3 state, 4 ppid
        let _ = write!(line, "{} ({}) {} {}", t.pid.0, comm, state_char(t.state), t.parent.0);
        // 5 pgrp, 6 session, 7 tty_nr, 8 tpgid, 9 flags, 10-13 {min,maj}flt(+child)
        for _ in 0..9 {
            let _ = write!(line, " 0");
        }
        // 14 utime, 15 stime, 16-17 c{u,s}time
        for _ in 0..4 {
            let _ = write!(line, " 0");
        }
        // 18 priority, 19 nice
        let _ = write!(line, " {} {}", t.sched.static_priority, t.sched.nice);
        // 20 num_threads, 21 itrealvalue, 22 starttime
        let _ = write!(line, " 0 0 {}", t.sched.last_scheduled_tick);
        // 23 vsize, 24 rss, 25 rsslim
        let _ = write!(line, " 0 0 0");
        // 26 startcode, 27 endcode, 28 startstack, 29 kstkesp, 30 kstkeip
        let _ = write!(line, " 0 0 0 0 0");
        // 31 signal, 32 blocked, 33 sigignore, 34 sigcatch, 35 wchan, 36-37 n{swap,c}
        for _ in 0..7 {
            let _ = write!(line, " 0");
        }
        // 38 exit_signal, 39 processor, 40 rt_priority, 41 policy, 42 blkio_ticks, 43 guest_time, 44 cguest_time
        for _ in 0..7 {
            let _ = write!(line, " 0");
        }
        // 45 start_data, 46 end_data, 47 start_brk
        let _ = write!(line, " 0 0 0");
        // 48 arg_start, 49 arg_end, 50 env_start, 51 env_end
        let _ = write!(line, " 0 0 0 0");
        // 52 exit_code
        let _ = write!(line, " {}\n", t.exit_status);
        line
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::context::Context;

    #[test]
    fn cmdline_echoes_task_name_nul_terminated() {
        let pid = crate::process::spawn(Pid(1), None, Context::empty(), 0).unwrap();
        crate::process::with_task(pid, |t| t.set_name("init"));
        let line = cmdline(pid).unwrap();
        assert_eq!(line.as_bytes(), b"init\0");
        crate::process::reap(pid);
    }

    #[test]
    fn stat_has_52_space_separated_fields() {
        let pid = crate::process::spawn(Pid(1), None, Context::empty(), 0).unwrap();
        let line = stat(pid).unwrap();
        let text = core::str::from_utf8(line.as_bytes()).unwrap();
        let trimmed = text.trim_end_matches('\n');
        // comm is parenthesised and may itself contain spaces in the real
        // format; this kernel's task names never do, so a plain split
        // is exact here.
        assert_eq!(trimmed.split(' ').count(), 52);
        crate::process::reap(pid);
    }
}
