//! Multiboot hand-off: GRUB leaves a pointer to this structure in
//! `ebx` at kernel entry. Only the fields `init` actually consults are
//! modeled; the rest of the multiboot contract (modules, ELF section
//! headers, the full memory map) is the loader's business, not the
//! kernel core's.

#[repr(C)]
pub struct MultibootInfo {
    pub flags: u32,
    pub mem_lower: u32,
    pub mem_upper: u32,
    _rest: [u32; 0],
}

impl MultibootInfo {
    const FLAG_MEM: u32 = 1 << 0;

    /// Total installed RAM in bytes, as GRUB reports it. `mem_upper` is
    /// KiB above 1 MiB; falls back to a conservative 32 MiB guess when
    /// the bootloader didn't set the `mem` flag (should not happen with
    /// GRUB, but `init` must not trust hand-off data blindly).
    pub unsafe fn total_ram_bytes(info: *const Self) -> u32 {
        if info.is_null() {
            return 32 * 1024 * 1024;
        }
        let info = &*info;
        if info.flags & Self::FLAG_MEM == 0 {
            return 32 * 1024 * 1024;
        }
        (1024 * 1024) + info.mem_upper * 1024
    }
}
