//! Boot orchestration: brings up logging, traps, the virtual-memory
//! engine, and the first task, in the order each depends on the last.

use crate::memory::address_space::AddressSpace;
use crate::memory::frame::Frame;
use crate::memory::page_table::{self, Table};
use crate::process::context::Context;

/// Reserve the low 4 MiB for the kernel image, boot structures, and
/// the initial page tables GRUB/the boot stub already built; the
/// buddy allocator only ever hands out frames above this line.
const RESERVED_LOW_MEM: u32 = 4 * 1024 * 1024;

/// The page directory already active at kernel entry (built by the
/// boot stub before `kernel_main` runs) serves as the template every
/// subsequent address space copies its kernel-half PDEs from.
fn active_directory() -> &'static Table {
    let cr3: u32;
    unsafe { core::arch::asm!("mov {0}, cr3", out(reg) cr3, options(nostack, preserves_flags)) };
    unsafe { page_table::table_at(Frame::containing_address(cr3)) }
}

pub fn boot(multiboot_info: *const crate::boot::MultibootInfo) -> ! {
    crate::logging::init();
    log::info!("booting");

    crate::interrupts::init();
    crate::pit::init(crate::clock::TICKS_PER_SECOND as u32);

    let total_ram = unsafe { crate::boot::MultibootInfo::total_ram_bytes(multiboot_info) };
    let usable = total_ram.min(crate::memory::DIRECT_MAP_SIZE);
    let start = Frame::containing_address(RESERVED_LOW_MEM);
    let end = Frame::containing_address(usable);
    log::info!("mapping frames [{}, {}) ({} MiB usable)", start.0, end.0, usable / (1024 * 1024));
    crate::memory::buddy::init(start, end);

    spawn_init();

    log::info!("scheduling first task");
    crate::process::scheduler::yield_cpu();
    crate::errno::kernel_bug("scheduler returned to init::boot after the first task was scheduled");
}

/// Build pid 1's address space and task-table entry. Loading an actual
/// user program image needs a loader and a VFS, neither of which
/// exists here; this only establishes the address space and
/// kernel-stack plumbing a first task needs to exist at all.
fn spawn_init() {
    let template = active_directory();
    let space = AddressSpace::new_user(template).unwrap_or_else(|e| crate::errno::kernel_bug(e));

    const KERNEL_STACK_PAGES: usize = 4;
    let stack_frame = crate::memory::frame::alloc_pages(KERNEL_STACK_PAGES)
        .unwrap_or_else(|| crate::errno::kernel_bug("out of memory for init's kernel stack"));
    let stack_top = crate::memory::phys_to_virt(stack_frame.start_address()) + (KERNEL_STACK_PAGES * 4096) as u32;

    let context = Context::new(idle_loop as u32, stack_top);
    let pid =
        crate::process::spawn(crate::process::PID_INIT, Some(space), context, 0).unwrap_or_else(|| crate::errno::kernel_bug("task table full at boot"));
    debug_assert_eq!(pid, crate::process::PID_INIT);
}

/// Placeholder body for pid 1 until a real init program is loaded by
/// the (external) loader: park forever, yielding the CPU each tick.
extern "C" fn idle_loop() -> ! {
    loop {
        unsafe { core::arch::asm!("sti; hlt") };
    }
}
