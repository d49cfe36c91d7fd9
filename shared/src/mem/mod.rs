use crate::sizes::{KB, MB};

// Page size is 4KB. This is a property of x86 processors.
pub const PAGE_FRAME_SIZE: usize = 4 * KB;

// A single page table covers 1024 pages, so directory entry 0 covers exactly
// this much of the address space.
pub const IDENTITY_MAP_SIZE: usize = 4 * MB;

// The multiboot loader puts the kernel image here.
pub const KERNEL_IMAGE_START: usize = MB;

// Backs the kernel's bump allocator on bare metal. The swap store alone needs
// SWAP_SLOTS * PAGE_FRAME_SIZE bytes of it.
pub const KERNEL_HEAP_START: usize = 0x0018_0000;
pub const KERNEL_HEAP_END: usize = PAGE_DIRECTORY_BASE;

pub const PAGE_DIRECTORY_BASE: usize = 0x0030_0000;

// Page tables are never drawn from the frame allocator. They all live in this
// statically reserved pool right after the directory, bootstrap table first.
pub const PAGE_TABLE_POOL_BASE: usize = PAGE_DIRECTORY_BASE + PAGE_FRAME_SIZE;
pub const PAGE_TABLE_POOL_LEN: usize = 8;

// Last identity-mapped frame, left unused so boot can scribble on it.
pub const SELF_TEST_ADDRESS: usize = IDENTITY_MAP_SIZE - PAGE_FRAME_SIZE;

// Everything below this belongs to the kernel image, heap and paging
// structures. The frame allocator starts here.
pub const RESERVED_LOW_MEMORY: usize = IDENTITY_MAP_SIZE;

// The QEMU machine the kernel is usually run on: 16MB of RAM, 1MB of swap.
pub const DEFAULT_TOTAL_MEMORY: usize = 16 * MB;
pub const SWAP_SLOTS: usize = 256;

/// Rounds `address` down to the start of the page containing it.
#[inline]
pub const fn page_base(address: usize) -> usize {
    address & !(PAGE_FRAME_SIZE - 1)
}

#[inline]
pub const fn is_page_aligned(address: usize) -> bool {
    address % PAGE_FRAME_SIZE == 0
}
