//! CPU exceptions, the PIT tick, and the `int 0x80` syscall gate, all
//! registered into one IDT.

pub mod exception;
pub mod idt;
pub mod pic;

use exception::ExceptionStackFrame;
use idt::InterruptDescriptorTable;
use lazy_static::lazy_static;

/// `int 0x80` is the syscall gate; dpl=3 so user mode may
/// issue it directly.
pub const SYSCALL_VECTOR: u8 = 0x80;
const TIMER_VECTOR: u8 = pic::PIC1_OFFSET;
const DOUBLE_FAULT_VECTOR: u8 = 8;
const GENERAL_PROTECTION_FAULT_VECTOR: u8 = 13;
const PAGE_FAULT_VECTOR: u8 = 14;

lazy_static! {
    static ref IDT: InterruptDescriptorTable = {
        let mut idt = InterruptDescriptorTable::new();
        idt.add_double_fault_handler(DOUBLE_FAULT_VECTOR, double_fault_handler);
        idt.add_handler_with_error(GENERAL_PROTECTION_FAULT_VECTOR, general_protection_fault_handler);
        idt.add_handler_with_error(PAGE_FAULT_VECTOR, page_fault_handler);
        idt.add_handler(TIMER_VECTOR, timer_handler);
        idt.entries[SYSCALL_VECTOR as usize]
            .set_handler_addr(crate::process::syscall::syscall_entry as u32)
            .set_privilege_level(3);
        idt
    };
}

/// Load the IDT, remap the PIC past the CPU's own exception vectors,
/// and unmask the timer line. Call once, early in boot.
pub fn init() {
    IDT.load();
    pic::initialize();
    pic::enable_irq(0); // timer
    unsafe { core::arch::asm!("sti") };
}

extern "x86-interrupt" fn timer_handler(_frame: &mut ExceptionStackFrame) {
    crate::clock::tick();
    pic::end_of_interrupt(TIMER_VECTOR);
    crate::process::scheduler::on_tick();
}

extern "x86-interrupt" fn page_fault_handler(_frame: &mut ExceptionStackFrame, error_code: u32) {
    use crate::memory::page_fault::{self, FaultCode};

    let fault_addr = page_fault::faulting_address();
    let code = FaultCode::from_bits_truncate(error_code);

    let Some(pid) = crate::process::scheduler::current() else {
        crate::errno::kernel_bug("page fault with no running task");
    };

    let outcome = crate::process::with_task(pid, |task| {
        let space = task
            .address_space
            .as_mut()
            .unwrap_or_else(|| crate::errno::kernel_bug("page fault in a task with no address space"));
        page_fault::handle(space, fault_addr, code)
    });

    if outcome == Some(page_fault::Outcome::Segv) {
        crate::process::signal::deliver_segv(pid);
        crate::process::scheduler::yield_cpu();
    }
}

extern "x86-interrupt" fn general_protection_fault_handler(frame: &mut ExceptionStackFrame, error_code: u32) {
    log::error!(
        "general protection fault: error_code={:#x} eip={:#x}",
        error_code,
        frame.instruction_pointer
    );
    match crate::process::scheduler::current() {
        Some(pid) => {
            crate::process::signal::deliver_segv(pid);
            crate::process::scheduler::yield_cpu();
        }
        None => crate::errno::kernel_bug("general protection fault with no running task"),
    }
}

extern "x86-interrupt" fn double_fault_handler(frame: &mut ExceptionStackFrame, error_code: u32) -> ! {
    log::error!("double fault: error_code={:#x} eip={:#x}", error_code, frame.instruction_pointer);
    crate::errno::kernel_bug("double fault")
}
