//! Virtual-memory engine: paging, address spaces, the page-fault path.
//!
//! The kernel is linked at the higher half (`KERNEL_VIRTUAL_BASE`); the
//! low `DIRECT_MAP_SIZE` bytes of physical RAM are additionally mapped
//! 1:1 at `KERNEL_VIRTUAL_BASE + phys`, giving every subsystem here a
//! permanent way to touch an arbitrary physical frame without a
//! temporary mapping dance, since direct-mapped RAM is bounded to
//! 256 MiB.

pub mod address_space;
pub mod buddy;
pub mod frame;
pub mod page_fault;
pub mod page_table;
pub mod vma;

/// Where the kernel (and the direct physical map) live in every
/// address space's virtual layout.
pub const KERNEL_VIRTUAL_BASE: u32 = 0xC000_0000;

/// How much physical RAM is kept permanently mapped. Matches the
/// `buddy`/`frame` table's `MAX_FRAMES` bound (64K frames = 256 MiB).
pub const DIRECT_MAP_SIZE: u32 = 256 * 1024 * 1024;

/// Translate a physical address to its direct-mapped kernel virtual
/// address. Panics (via kernel_bug) outside the mapped window — no
/// subsystem should ever be touching physical memory beyond it.
pub fn phys_to_virt(phys_addr: u32) -> u32 {
    if phys_addr >= DIRECT_MAP_SIZE {
        crate::errno::kernel_bug("phys_to_virt outside direct-mapped window");
    }
    KERNEL_VIRTUAL_BASE + phys_addr
}

pub fn virt_to_phys_direct(virt_addr: u32) -> Option<u32> {
    virt_addr.checked_sub(KERNEL_VIRTUAL_BASE).filter(|p| *p < DIRECT_MAP_SIZE)
}
