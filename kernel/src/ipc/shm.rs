//! System V shared memory: `shmget`/`shmat`/`shmdt`/`shmctl`. Unlike
//! semaphores and message queues, attach/detach never blocks — the
//! segment's frames are either already there or the call fails
//! outright.

use spin::Mutex;

use super::{IpcPerm, IPC_CREAT, IPC_EXCL};
use crate::errno::Errno;
use crate::memory::address_space::AddressSpace;
use crate::memory::frame::{self, Frame, PAGE_SIZE};
use crate::memory::page_table::EntryFlags;
use crate::memory::vma::{Vma, VmaKind};

pub const MAX_SEGMENTS: usize = 16;
pub const MAX_PAGES_PER_SEGMENT: usize = 64;

struct Segment {
    used: bool,
    perm: IpcPerm,
    first_frame: Frame,
    page_count: usize,
    size_bytes: usize,
    attach_count: u32,
    last_attach_pid: u32,
    last_detach_pid: u32,
}

impl Segment {
    const fn empty() -> Self {
        Self {
            used: false,
            perm: IpcPerm { key: 0, id: 0, uid: 0, gid: 0, cuid: 0, cgid: 0, mode: 0, dest: false },
            first_frame: Frame(0),
            page_count: 0,
            size_bytes: 0,
            attach_count: 0,
            last_attach_pid: 0,
            last_detach_pid: 0,
        }
    }
}

struct ShmTable {
    segments: [Segment; MAX_SEGMENTS],
    next_id: i32,
}

impl ShmTable {
    const fn new() -> Self {
        const EMPTY: Segment = Segment::empty();
        Self { segments: [EMPTY; MAX_SEGMENTS], next_id: 1 }
    }

    fn find_by_key(&self, key: i32) -> Option<usize> {
        self.segments.iter().position(|s| s.used && s.perm.key == key)
    }

    fn slot_of(&self, id: i32) -> Option<usize> {
        self.segments.iter().position(|s| s.used && s.perm.id == id)
    }
}

static SEGMENTS: Mutex<ShmTable> = Mutex::new(ShmTable::new());

fn pages_for(size: usize) -> usize {
    size.div_ceil(PAGE_SIZE)
}

/// `shmget(key, size, flags)`.
pub fn shmget(key: i32, size: usize, flags: i32, uid: u32, gid: u32) -> Result<i32, Errno> {
    let mut table = SEGMENTS.lock();

    if key != 0 {
        if let Some(slot) = table.find_by_key(key) {
            if flags & IPC_CREAT != 0 && flags & IPC_EXCL != 0 {
                return Err(Errno::Eexist);
            }
            return Ok(table.segments[slot].perm.id);
        }
    }

    if flags & IPC_CREAT == 0 {
        return Err(Errno::Enoent);
    }

    let page_count = pages_for(size);
    if page_count == 0 || page_count > MAX_PAGES_PER_SEGMENT {
        return Err(Errno::Einval);
    }

    let first_frame = frame::alloc_pages(page_count).ok_or(Errno::Enomem)?;
    for i in 0..page_count {
        let f = Frame(first_frame.0 + i as u32);
        unsafe { core::ptr::write_bytes(crate::memory::phys_to_virt(f.start_address()) as *mut u8, 0, PAGE_SIZE) };
    }

    let slot = table.segments.iter().position(|s| !s.used).ok_or(Errno::Enomem)?;
    let id = table.next_id;
    table.next_id += 1;

    let seg = &mut table.segments[slot];
    *seg = Segment::empty();
    seg.used = true;
    seg.perm = IpcPerm::new(key, id, uid, gid, (flags & 0o777) as u16);
    seg.first_frame = first_frame;
    seg.page_count = page_count;
    seg.size_bytes = size;
    Ok(id)
}

/// `shmat(id, hint, flags)`: maps the segment into `space` at `hint`
/// (page-aligned; a `None` hint currently still requires the caller to
/// have reserved the range via a VMA, matching how `AddressSpace` has
/// no general mmap-placement allocator of its own).
pub fn shmat(id: i32, space: &mut AddressSpace, virt_addr: u32, caller_pid: u32) -> Result<u32, Errno> {
    let mut table = SEGMENTS.lock();
    let slot = table.slot_of(id).ok_or(Errno::Einval)?;
    let seg = &mut table.segments[slot];

    let aligned = virt_addr & !0xFFF;
    for i in 0..seg.page_count {
        let f = Frame(seg.first_frame.0 + i as u32);
        frame::refcount_inc(f);
        unsafe {
            space.map_page(aligned + (i * PAGE_SIZE) as u32, f, EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER);
        }
    }
    let vma = Vma {
        start: aligned,
        size_pages: seg.page_count,
        flags: EntryFlags::WRITABLE | EntryFlags::USER,
        kind: VmaKind::Anonymous,
    };
    space.add_vma(vma).map_err(|_| Errno::Enomem)?;

    seg.attach_count += 1;
    seg.last_attach_pid = caller_pid;
    Ok(aligned)
}

/// `shmdt(addr)`: unmap the segment covering `addr` in `space`.
pub fn shmdt(addr: u32, space: &mut AddressSpace, caller_pid: u32) -> Result<(), Errno> {
    let vma = space.find_vma(addr).ok_or(Errno::Einval)?;

    let mut table = SEGMENTS.lock();
    let slot = table
        .segments
        .iter()
        .position(|s| s.used && s.first_frame.start_address() <= addr && addr < s.first_frame.start_address() + (s.page_count * PAGE_SIZE) as u32)
        .or_else(|| {
            // fall back to matching by the VMA's page count; a segment's
            // frames need not be contiguous with the VMA's base address
            // once multiple segments share an address space.
            table.segments.iter().position(|s| s.used && s.page_count == vma.size_pages)
        })
        .ok_or(Errno::Einval)?;
    let seg = &mut table.segments[slot];

    for i in 0..seg.page_count {
        crate::memory::page_table::invalidate(vma.start + (i * PAGE_SIZE) as u32);
        let f = Frame(seg.first_frame.0 + i as u32);
        frame::refcount_dec(f);
    }
    seg.attach_count = seg.attach_count.saturating_sub(1);
    seg.last_detach_pid = caller_pid;

    if seg.perm.dest && seg.attach_count == 0 {
        seg.used = false;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShmCtlCmd {
    IpcStat,
    IpcSet,
    IpcRmId,
}

pub fn shmctl(id: i32, cmd: ShmCtlCmd) -> Result<(), Errno> {
    let mut table = SEGMENTS.lock();
    let slot = table.slot_of(id).ok_or(Errno::Einval)?;
    let seg = &mut table.segments[slot];
    match cmd {
        ShmCtlCmd::IpcStat | ShmCtlCmd::IpcSet => Ok(()),
        ShmCtlCmd::IpcRmId => {
            seg.perm.dest = true;
            if seg.attach_count == 0 {
                seg.used = false;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_for_rounds_up() {
        assert_eq!(pages_for(1), 1);
        assert_eq!(pages_for(PAGE_SIZE), 1);
        assert_eq!(pages_for(PAGE_SIZE + 1), 2);
    }

    #[test]
    fn shmget_by_key_returns_existing_id() {
        let key = 17;
        let id1 = shmget(key, 4096, IPC_CREAT, 0, 0).unwrap();
        let id2 = shmget(key, 4096, 0, 0, 0).unwrap();
        assert_eq!(id1, id2);
        shmctl(id1, ShmCtlCmd::IpcRmId).unwrap();
    }

    #[test]
    fn shmget_excl_on_existing_key_fails() {
        let key = 99;
        shmget(key, 4096, IPC_CREAT, 0, 0).unwrap();
        let err = shmget(key, 4096, IPC_CREAT | IPC_EXCL, 0, 0).unwrap_err();
        assert_eq!(err, Errno::Eexist);
    }
}
