//! QEMU launcher for the i686 multiboot image built by `kernel`.
//!
//! Mirrors the teacher's UEFI/OVMF runner, adapted to the BIOS + GRUB
//! multiboot boot path this kernel actually uses (no 64-bit bootloader
//! crate involved). Unlike the teacher's runner, the ISO can't be
//! produced as a side effect of `cargo build` in this package — it's
//! assembled from the cross-compiled kernel binary via
//! `grub-mkrescue` after building `kernel` for the `i686-mentos`
//! target — so the path is read at run time rather than baked in via
//! `env!`.

fn main() {
    let iso_path = std::env::var("MENTOS_ISO_PATH").unwrap_or_else(|_| "target/mentos.iso".to_string());

    let mut cmd = std::process::Command::new("qemu-system-i386");
    cmd.arg("-cdrom").arg(iso_path);
    cmd.arg("-m").arg("256M");
    cmd.arg("-serial").arg("stdio");
    cmd.arg("-no-reboot");
    cmd.arg("-no-shutdown");

    let mut child = cmd.spawn().expect("failed to launch qemu-system-i386");
    child.wait().expect("qemu exited abnormally");
}
