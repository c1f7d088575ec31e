//! `AddressSpace`: one task's page directory plus its VMA list.
//! Exclusively owned by its task — no sharing; the frames it maps may
//! still be shared via COW or shm attach.

use super::frame::{self, Frame};
use super::page_table::{self, EntryFlags, Table};
use super::vma::{Vma, VmaList};

pub struct AddressSpace {
    directory_frame: Frame,
    pub vmas: VmaList,
}

unsafe impl Send for AddressSpace {}

impl AddressSpace {
    /// A fresh user address space: new directory frame, kernel PDEs
    /// copied from the template so every address space can see the
    /// kernel's higher half, empty VMA list.
    pub fn new_user(kernel_template: &Table) -> Result<Self, &'static str> {
        let frame = frame::alloc_page().ok_or("out of memory for page directory")?;
        let dir = unsafe { page_table::table_at(frame) };
        dir.zero();

        let kernel_dir_start = (super::KERNEL_VIRTUAL_BASE >> 22) as usize;
        for i in kernel_dir_start..page_table::ENTRY_COUNT {
            *dir.entry_mut(i) = *kernel_template.entry(i);
        }

        Ok(Self { directory_frame: frame, vmas: VmaList::new() })
    }

    pub fn directory(&self) -> &'static mut Table {
        unsafe { page_table::table_at(self.directory_frame) }
    }

    pub fn directory_frame(&self) -> Frame {
        self.directory_frame
    }

    pub fn add_vma(&mut self, vma: Vma) -> Result<(), &'static str> {
        self.vmas.add(vma)
    }

    pub fn find_vma(&self, addr: u32) -> Option<Vma> {
        self.vmas.find(addr).copied()
    }

    /// Activate this address space (load CR3). No-op check is the
    /// caller's responsibility; this always writes.
    ///
    /// # Safety
    /// `self` must outlive the time it spends installed in CR3.
    pub unsafe fn activate(&self) {
        let phys = self.directory_frame.start_address();
        core::arch::asm!("mov cr3, {0}", in(reg) phys, options(nostack, preserves_flags));
    }

    /// Install a single user page, copying its PTE-level flags.
    /// Allocates an intermediate page table frame on demand.
    pub unsafe fn map_page(&self, virt_addr: u32, frame: Frame, flags: EntryFlags) {
        let (dir_idx, tab_idx, _) = page_table::decompose(virt_addr);
        let directory = self.directory();
        let pde = directory.entry_mut(dir_idx);

        let table_frame = match pde.frame() {
            Some(f) => f,
            None => {
                let f = super::frame::alloc_page().unwrap_or_else(|| {
                    crate::errno::kernel_bug("out of memory for page table")
                });
                page_table::table_at(f).zero();
                pde.set(f, EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER);
                f
            }
        };

        let table = page_table::table_at(table_frame);
        table.entry_mut(tab_idx).set(frame, flags | EntryFlags::PRESENT);
        page_table::invalidate(virt_addr);
    }

    /// Fork this address space's user mappings as copy-on-write: every
    /// writable present PTE is marked read-only + `COW` in both the
    /// parent and the child, and the frame's refcount is bumped once
    /// for the new reference. The child's kernel half is copied from
    /// `self`'s own directory, which already carries correct kernel
    /// PDEs from whatever template it was itself built against.
    pub fn fork_cow(&self) -> Result<Self, &'static str> {
        let mut child = Self::new_user(self.directory())?;
        let user_dir_end = (super::KERNEL_VIRTUAL_BASE >> 22) as usize;

        let parent_dir = self.directory();
        for dir_idx in 0..user_dir_end {
            let pde = parent_dir.entry_mut(dir_idx);
            let Some(table_frame) = pde.frame() else { continue };
            let parent_table = unsafe { page_table::table_at(table_frame) };

            let child_table_frame = frame::alloc_page().ok_or("out of memory during fork")?;
            unsafe { page_table::table_at(child_table_frame).zero() };

            for tab_idx in 0..page_table::ENTRY_COUNT {
                let pte = parent_table.entry_mut(tab_idx);
                let Some(data_frame) = pte.frame() else { continue };

                let was_writable = pte.flags().contains(EntryFlags::WRITABLE);
                let shared_flags = if was_writable {
                    (pte.flags() & !EntryFlags::WRITABLE) | EntryFlags::COW
                } else {
                    pte.flags()
                };
                pte.set(data_frame, shared_flags);
                unsafe { page_table::table_at(child_table_frame).entry_mut(tab_idx).set(data_frame, shared_flags) };
                frame::refcount_inc(data_frame);

                let virt = ((dir_idx as u32) << 22) | ((tab_idx as u32) << 12);
                page_table::invalidate(virt);
            }

            let child_dir = child.directory();
            child_dir.entry_mut(dir_idx).set(
                child_table_frame,
                EntryFlags::PRESENT | EntryFlags::WRITABLE | EntryFlags::USER,
            );
        }

        for vma in self.vmas.iter() {
            child.add_vma(*vma)?;
        }

        Ok(child)
    }
}
