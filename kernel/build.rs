//! Assembles the multiboot boot stub and tells rustc to link it in.
//! The rest of the kernel is pure Rust; this is the one place that
//! needs a real assembler, the same split the teacher's own build
//! never had to make since it relied on a prebuilt UEFI bootloader
//! instead of a hand-rolled multiboot entry.

fn main() {
    cc::Build::new()
        .file("src/boot.s")
        .flag("-m32")
        .compile("boot_stub");

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rerun-if-changed=src/boot.s");
    println!("cargo:rerun-if-changed=linker.ld");
    println!("cargo:rustc-link-arg=-T{manifest_dir}/linker.ld");
    println!("cargo:rustc-link-arg=-nostartfiles");
}
