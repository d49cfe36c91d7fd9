// https://www.gnu.org/software/grub/manual/multiboot2/multiboot.html

#![allow(clippy::cast_possible_truncation)]

use core::{arch::global_asm, mem::size_of, ptr};
use mokernel_shared::{
    eprintln,
    mem::{DEFAULT_TOTAL_MEMORY, KERNEL_IMAGE_START},
    sizes::KB,
};

/// Value multiboot2 compatible bootloaders load into eax before jumping to
/// the kernel.
const EXPECTED_MAGIC: u32 = 0x36D7_6289;

const HEADER_MAGIC: u32 = 0xE852_50D6;
const ARCHITECTURE_I386: u32 = 0;
const HEADER_LENGTH: u32 = size_of::<Header>() as u32;

const TAG_END: u32 = 0;
const TAG_BASIC_MEMORY_INFO: u32 = 4;

#[repr(C, align(8))]
struct Header {
    magic: u32,
    architecture: u32,
    header_length: u32,
    checksum: u32,
    end_tag: HeaderTag,
}

#[repr(C, align(8))]
struct HeaderTag {
    r#type: u16,
    flags: u16,
    size: u32,
}

#[used]
#[link_section = ".multiboot2_header"]
static HEADER: Header = Header {
    magic: HEADER_MAGIC,
    architecture: ARCHITECTURE_I386,
    header_length: HEADER_LENGTH,
    checksum: (HEADER_MAGIC
        .wrapping_add(ARCHITECTURE_I386)
        .wrapping_add(HEADER_LENGTH))
    .wrapping_neg(),
    end_tag: HeaderTag {
        r#type: 0,
        flags: 0,
        size: size_of::<HeaderTag>() as u32,
    },
};

const BOOT_STACK_SIZE: usize = 16 * KB;

#[repr(C, align(16))]
struct BootStack([u8; BOOT_STACK_SIZE]);

static mut BOOT_STACK: BootStack = BootStack([0; BOOT_STACK_SIZE]);

global_asm!(
    "
    .global _start
    _start:
        cli
        lea esp, [{stack} + {stack_size}]
        push ebx
        push eax
        call {boot}
    ",
    stack = sym BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    boot = sym boot,
);

extern "C" {
    fn main(mem_upper: usize) -> !;
}

/// Checks the bootloader handoff and enters the kernel with the amount of
/// upper memory in KB.
unsafe extern "C" fn boot(magic: u32, info: *const u8) -> ! {
    if magic != EXPECTED_MAGIC {
        eprintln!("invalid multiboot2 magic, expected {EXPECTED_MAGIC:#X}, got {magic:#X}");
        super::halt();
    }

    let mem_upper = basic_memory_info(info).unwrap_or_else(|| {
        eprintln!("no basic memory info from the bootloader, assuming the default");
        (DEFAULT_TOTAL_MEMORY - KERNEL_IMAGE_START) / KB
    });

    main(mem_upper)
}

/// Walks the boot information tags for the upper memory size.
unsafe fn basic_memory_info(info: *const u8) -> Option<usize> {
    let total_size = ptr::read(info.cast::<u32>()) as usize;
    // Tags start after the total size and a reserved word, 8 byte aligned.
    let mut offset = 8;

    while offset + 8 <= total_size {
        let tag = info.add(offset).cast::<u32>();
        let (kind, size) = (ptr::read(tag), ptr::read(tag.add(1)) as usize);
        match kind {
            TAG_END => return None,
            // Followed by mem_lower, then mem_upper.
            TAG_BASIC_MEMORY_INFO => return Some(ptr::read(tag.add(3)) as usize),
            _ => {}
        }
        if size < 8 {
            return None;
        }
        offset += size.next_multiple_of(8);
    }

    None
}
