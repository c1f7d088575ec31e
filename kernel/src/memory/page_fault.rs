//! Page-fault dispatcher: decodes the trap's error code, walks the
//! current address space's page tables, and either demand-pages,
//! resolves COW, delivers `SIGSEGV`, or panics.

use super::address_space::AddressSpace;
use super::frame;
use super::page_table::{self, EntryFlags};
use super::vma::VmaKind;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct FaultCode: u32 {
        /// Fault was a protection violation (PTE present) vs not-present.
        const PRESENT = 1 << 0;
        /// The access was a write.
        const WRITE   = 1 << 1;
        /// The fault happened in user mode.
        const USER    = 1 << 2;
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Fault resolved transparently; re-execute the faulting instruction.
    Resolved,
    /// Deliver `SIGSEGV` to the current task and fall back to the scheduler.
    Segv,
}

/// Read CR2, the faulting linear address, at trap entry.
pub fn faulting_address() -> u32 {
    let addr: u32;
    unsafe { core::arch::asm!("mov {0}, cr2", out(reg) addr, options(nostack, preserves_flags)) };
    addr
}

/// Resolve a page fault against `space`. The one ambiguous case — a
/// kernel-mode write fault on a present, non-COW, write-protected PTE —
/// is treated as a kernel bug, never silently continued.
pub fn handle(space: &mut AddressSpace, fault_addr: u32, code: FaultCode) -> Outcome {
    let is_write = code.contains(FaultCode::WRITE);
    let is_user = code.contains(FaultCode::USER);
    let was_present = code.contains(FaultCode::PRESENT);

    let directory = space.directory();
    let (dir_idx, _tab_idx, _) = page_table::decompose(fault_addr);
    let pde_present = directory.entry(dir_idx).flags().contains(EntryFlags::PRESENT);

    if !pde_present {
        if !is_user {
            crate::errno::kernel_bug("page fault in kernel mode with absent PDE");
        }
        return Outcome::Segv;
    }

    let entry = unsafe { page_table::lookup_entry(directory, fault_addr) };
    let Some(entry) = entry else {
        if !is_user {
            crate::errno::kernel_bug("page fault in kernel mode: PDE present, no PTE slot");
        }
        return Outcome::Segv;
    };

    let flags = entry.flags();
    let pte_present = was_present && flags.contains(EntryFlags::PRESENT);
    let is_cow = flags.contains(EntryFlags::COW);

    match (pte_present, is_cow) {
        (false, true) => {
            if demand_page(space, fault_addr) { Outcome::Resolved } else { Outcome::Segv }
        }
        (true, true) if is_write => {
            if resolve_cow(space, fault_addr) { Outcome::Resolved } else { Outcome::Segv }
        }
        (true, false) => {
            if is_user {
                Outcome::Segv
            } else {
                crate::errno::kernel_bug("kernel-mode write fault on write-protected, non-COW page")
            }
        }
        _ => {
            if is_user {
                Outcome::Segv
            } else {
                crate::errno::kernel_bug("unresolvable page fault in kernel mode")
            }
        }
    }
}

fn page_aligned(addr: u32) -> u32 {
    addr & !0xFFF
}

/// Returns `false` on allocation failure, which the caller turns into
/// `SIGSEGV` — a recoverable form of memory exhaustion.
fn demand_page(space: &mut AddressSpace, fault_addr: u32) -> bool {
    let Some(vma) = space.find_vma(fault_addr) else {
        crate::errno::kernel_bug("demand page fault outside any VMA");
    };
    if vma.kind == VmaKind::Code {
        crate::errno::kernel_bug("demand page fault on code VMA");
    }

    let Some(new_frame) = frame::alloc_page() else {
        log::warn!("demand paging OOM at {:#x}", fault_addr);
        return false;
    };
    zero_frame(new_frame.start_address());

    unsafe {
        space.map_page(page_aligned(fault_addr), new_frame, vma.flags);
    }
    true
}

fn resolve_cow(space: &mut AddressSpace, fault_addr: u32) -> bool {
    let aligned = page_aligned(fault_addr);
    let directory = space.directory();
    let old_frame = unsafe { page_table::lookup_entry(directory, aligned) }
        .and_then(|e| e.frame())
        .unwrap_or_else(|| crate::errno::kernel_bug("COW fault with no backing frame"));

    if frame::refcount_get(old_frame) <= 1 {
        // Sole owner: no copy needed, just drop the write-protection.
        unsafe { space.map_page(aligned, old_frame, EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER) };
        return true;
    }

    let Some(new_frame) = frame::alloc_page() else {
        log::warn!("COW fault OOM at {:#x}", fault_addr);
        return false;
    };
    unsafe {
        core::ptr::copy_nonoverlapping(
            super::phys_to_virt(old_frame.start_address()) as *const u8,
            super::phys_to_virt(new_frame.start_address()) as *mut u8,
            frame::PAGE_SIZE,
        );
    }
    frame::refcount_dec(old_frame);
    unsafe { space.map_page(aligned, new_frame, EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER) };
    true
}

fn zero_frame(phys_addr: u32) {
    unsafe {
        core::ptr::write_bytes(super::phys_to_virt(phys_addr) as *mut u8, 0, frame::PAGE_SIZE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_code_bits_match_spec_layout() {
        let code = FaultCode::from_bits_truncate(0b110);
        assert!(code.contains(FaultCode::WRITE));
        assert!(code.contains(FaultCode::USER));
        assert!(!code.contains(FaultCode::PRESENT));
    }
}
