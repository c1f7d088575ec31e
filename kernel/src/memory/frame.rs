//! Physical frame table: per-frame reference counts backing
//! copy-on-write sharing.
//!
//! A frame is identified by its physical page number (physical address
//! divided by 4096). The table is a flat array of refcounts, sized to
//! the amount of RAM the buddy allocator was initialized with. This is
//! the single source of truth for "how many PTEs reference this frame";
//! `memory::buddy` only decides *which* frames are free, this decides
//! *whether* a present frame is still owned by anyone.

use spin::Mutex;

pub const PAGE_SIZE: usize = 4096;

/// Physical frame number (physical address >> 12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Frame(pub u32);

impl Frame {
    pub fn containing_address(phys_addr: u32) -> Self {
        Frame(phys_addr / PAGE_SIZE as u32)
    }

    pub fn start_address(self) -> u32 {
        self.0 * PAGE_SIZE as u32
    }
}

/// Upper bound on tracked physical RAM: 64 K frames = 256 MiB, matching
/// the `-m 256M` the runner hands QEMU. No heap allocation is involved;
/// the table is a fixed-size array like `memory::vma`'s process table.
const MAX_FRAMES: usize = 64 * 1024;

struct RefcountTable {
    counts: [u8; MAX_FRAMES],
    frame_count: usize,
}

impl RefcountTable {
    const fn empty() -> Self {
        RefcountTable { counts: [0; MAX_FRAMES], frame_count: 0 }
    }
}

static REFCOUNTS: Mutex<RefcountTable> = Mutex::new(RefcountTable::empty());

/// Record how many frames the buddy allocator was initialized with.
/// Called once by `memory::buddy::init` after it knows how much RAM is
/// installed.
pub fn init(frame_count: usize) {
    let mut table = REFCOUNTS.lock();
    table.frame_count = frame_count.min(MAX_FRAMES);
}

/// Allocate a single zeroed frame.
pub fn alloc_page() -> Option<Frame> {
    let frame = crate::memory::buddy::alloc_frames(1)?;
    refcount_set(frame, 1);
    Some(frame)
}

/// Allocate `n` contiguous frames (shared-memory segments want this).
pub fn alloc_pages(n: usize) -> Option<Frame> {
    let frame = crate::memory::buddy::alloc_frames(n)?;
    for i in 0..n {
        refcount_set(Frame(frame.0 + i as u32), 1);
    }
    Some(frame)
}

/// Return a frame to the allocator. No-op (and a kernel bug) if its
/// refcount has not reached zero.
pub fn free_page(frame: Frame) {
    let count = refcount_get(frame);
    if count != 0 {
        crate::errno::kernel_bug("free_page on frame with nonzero refcount");
    }
    crate::memory::buddy::free_frames(frame, 1);
}

pub fn refcount_inc(frame: Frame) {
    let mut table = REFCOUNTS.lock();
    let idx = frame.0 as usize;
    if idx >= table.frame_count {
        crate::errno::kernel_bug("refcount_inc on frame outside table");
    }
    table.counts[idx] = table.counts[idx].saturating_add(1);
}

/// Decrement a frame's refcount, freeing it at zero. Returns the new count.
pub fn refcount_dec(frame: Frame) -> u8 {
    let new_count = {
        let mut table = REFCOUNTS.lock();
        let idx = frame.0 as usize;
        if idx >= table.frame_count || table.counts[idx] == 0 {
            crate::errno::kernel_bug("refcount_dec underflow");
        }
        table.counts[idx] -= 1;
        table.counts[idx]
    };
    if new_count == 0 {
        free_page(frame);
    }
    new_count
}

pub fn refcount_get(frame: Frame) -> u8 {
    let table = REFCOUNTS.lock();
    if (frame.0 as usize) < table.frame_count { table.counts[frame.0 as usize] } else { 0 }
}

fn refcount_set(frame: Frame, value: u8) {
    let mut table = REFCOUNTS.lock();
    let idx = frame.0 as usize;
    if idx >= table.frame_count {
        crate::errno::kernel_bug("refcount_set on frame outside table");
    }
    table.counts[idx] = value;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_address_roundtrip() {
        let f = Frame::containing_address(0x0040_3000);
        assert_eq!(f.0, 0x403);
        assert_eq!(f.start_address(), 0x0040_3000);
    }
}
