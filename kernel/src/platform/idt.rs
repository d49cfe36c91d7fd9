// https://wiki.osdev.org/Interrupt_Descriptor_Table
// https://wiki.osdev.org/Exceptions

use super::gdt::KERNEL_CODE_SELECTOR;
use arbitrary_int::{u2, u4};
use bitbybit::bitfield;
use core::{
    arch::{asm, global_asm},
    mem::size_of,
    ptr::{self, addr_of_mut},
};

pub const PAGE_FAULT_VECTOR: usize = 0xE;

// 32-bit interrupt gate: interrupts stay disabled inside the handler.
const INTERRUPT_GATE: u4 = u4::new(0xE);

#[bitfield(u64, default = 0)]
struct GateDescriptor {
    #[bits([0..=15, 48..=63], rw)]
    offset: u32,
    #[bits(16..=31, rw)]
    segment_selector: u16,
    #[bits(40..=43, rw)]
    gate_type: u4,
    #[bits(45..=46, rw)]
    descriptor_privilege_level: u2,
    #[bit(47, rw)]
    present: bool,
}

#[repr(C, packed)]
struct IdtDescriptor {
    size: u16,
    offset: u32,
}

const IDT_LEN: usize = 256;
static mut IDT: [GateDescriptor; IDT_LEN] = [GateDescriptor::DEFAULT; IDT_LEN];

extern "C" {
    fn page_fault_stub();
    fn unhandled_stub();
}

// The CPU pushes an error code for page faults. The faulting address is in
// CR2 and is handed to the handler as its only argument; the error code is
// dropped before returning so the faulting instruction is retried.
global_asm!(
    "
    .global page_fault_stub
    page_fault_stub:
        pushad
        cld
        mov eax, cr2
        push eax
        call {handler}
        add esp, 4
        popad
        add esp, 4
        iretd

    .global unhandled_stub
    unhandled_stub:
        cld
        call {unhandled}
    ",
    handler = sym super::page_fault_trap,
    unhandled = sym super::unhandled_trap,
);

/// Installs the page fault handler on vector 14. Every other vector halts.
///
/// # Safety
///
/// Interrupts must be disabled and [`super::gdt::load`] must have run.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn load() {
    let gate = |handler: unsafe extern "C" fn()| {
        GateDescriptor::DEFAULT
            .with_offset(handler as usize as u32)
            .with_segment_selector(KERNEL_CODE_SELECTOR)
            .with_gate_type(INTERRUPT_GATE)
            .with_present(true)
    };

    let idt = &mut *addr_of_mut!(IDT);
    idt.fill(gate(unhandled_stub));
    idt[PAGE_FAULT_VECTOR] = gate(page_fault_stub);

    let descriptor = IdtDescriptor {
        size: (size_of::<[GateDescriptor; IDT_LEN]>() - 1) as u16,
        offset: idt.as_ptr() as u32,
    };
    asm!("lidt [{}]", in(reg) ptr::addr_of!(descriptor), options(readonly, nostack, preserves_flags));
}
