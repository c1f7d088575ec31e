#![no_std]
#![no_main]

use mentos_kernel::{boot, init};

/// GRUB looks for this header within the first 8 KiB of the kernel
/// image (multiboot v1). `flags=0` asks for nothing beyond "load me
/// and tell me how much RAM there is".
#[repr(C, align(4))]
struct MultibootHeader {
    magic: u32,
    flags: u32,
    checksum: u32,
}

const MULTIBOOT_MAGIC: u32 = 0x1BADB002;

#[link_section = ".multiboot_header"]
#[used]
static MULTIBOOT_HEADER: MultibootHeader = MultibootHeader {
    magic: MULTIBOOT_MAGIC,
    flags: 0,
    checksum: (0u32).wrapping_sub(MULTIBOOT_MAGIC),
};

/// Called by `boot.s`'s `_start` once paging is enabled and the kernel
/// runs at its linked higher-half address. `eax`/`ebx` at multiboot
/// entry (the loader magic and the info struct pointer) are handed
/// down as ordinary cdecl arguments.
#[no_mangle]
pub extern "C" fn kernel_main(_magic: u32, multiboot_info: u32) -> ! {
    init::boot(multiboot_info as *const boot::MultibootInfo)
}
