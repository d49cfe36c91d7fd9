// https://wiki.osdev.org/GDT
// https://wiki.osdev.org/GDT_Tutorial

use arbitrary_int::{u13, u2, u20};
use bitbybit::bitfield;
use core::{arch::asm, mem::size_of, ptr};

#[bitfield(u64, default = 0)]
struct SegmentDescriptor {
    #[bits([0..=15, 48..=51], rw)]
    limit: u20,
    #[bits([16..=39, 56..=63], rw)]
    base: u32,
    #[bit(40, rw)]
    accessed: bool,
    #[bit(41, rw)]
    read_write: bool,
    #[bit(43, rw)]
    executable: bool,
    // Set for code and data segments, clear for system segments.
    #[bit(44, rw)]
    code_or_data: bool,
    #[bits(45..=46, rw)]
    descriptor_privilege_level: u2,
    #[bit(47, rw)]
    present: bool,
    #[bit(54, rw)]
    protected_32: bool,
    #[bit(55, rw)]
    page_granularity: bool,
}

#[bitfield(u16, default = 0)]
struct SegmentSelector {
    #[bits(0..=1, rw)]
    requested_privilege_level: u2,
    #[bit(2, rw)]
    local: bool,
    #[bits(3..=15, rw)]
    index: u13,
}

// The whole 4GB, ring 0. Marked accessed so the CPU never writes to the table.
const FLAT: SegmentDescriptor = SegmentDescriptor::DEFAULT
    .with_limit(u20::MAX)
    .with_page_granularity(true)
    .with_protected_32(true)
    .with_present(true)
    .with_code_or_data(true)
    .with_read_write(true)
    .with_accessed(true);

const GDT_LEN: usize = 3;

static GDT: [SegmentDescriptor; GDT_LEN] = [
    SegmentDescriptor::DEFAULT,
    FLAT.with_executable(true),
    FLAT,
];

pub const KERNEL_CODE_SELECTOR: u16 = SegmentSelector::DEFAULT
    .with_index(u13::new(1))
    .raw_value();
pub const KERNEL_DATA_SELECTOR: u16 = SegmentSelector::DEFAULT
    .with_index(u13::new(2))
    .raw_value();

#[repr(C, packed)]
struct GdtDescriptor {
    size: u16,
    offset: u32,
}

/// Replaces whatever table the bootloader left behind with a flat kernel code
/// and data segment, and reloads every segment register.
///
/// # Safety
///
/// Interrupts must be disabled.
#[allow(clippy::cast_possible_truncation)]
pub unsafe fn load() {
    let descriptor = GdtDescriptor {
        size: (size_of::<[SegmentDescriptor; GDT_LEN]>() - 1) as u16,
        offset: GDT.as_ptr() as u32,
    };

    // AT&T syntax for the far jump.
    asm!(
        "
        lgdt ({descriptor})
        ljmp ${code_selector}, $2f
2:
        mov ${data_selector}, {scratch:e}
        mov {scratch:x}, %ds
        mov {scratch:x}, %es
        mov {scratch:x}, %fs
        mov {scratch:x}, %gs
        mov {scratch:x}, %ss
        ",
        descriptor = in(reg) ptr::addr_of!(descriptor),
        scratch = out(reg) _,
        code_selector = const KERNEL_CODE_SELECTOR,
        data_selector = const KERNEL_DATA_SELECTOR,
        options(att_syntax),
    );
}
