// https://wiki.osdev.org/Paging
// https://wiki.osdev.org/Setting_Up_Paging

// Avoids lots of warnings about casting usize to u32 which cannot result in
// truncation on a 32-bit platform, which is all we support. It would be nice if
// you could tell clippy that you were only dealing with 32-bit usizes...
#![allow(clippy::cast_possible_truncation)]

use crate::mem::PAGE_FRAME_SIZE;
use arbitrary_int::{u10, u12, u20};
use bitbybit::bitfield;
use core::{mem::size_of, ops};

pub const PAGE_DIRECTORY_LEN: usize = PAGE_FRAME_SIZE / size_of::<u32>();
pub const PAGE_TABLE_LEN: usize = PAGE_FRAME_SIZE / size_of::<u32>();

/// The subset of entry flags callers choose when mapping a page. Present is
/// always added by the mapping code itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageFlags(u32);

impl PageFlags {
    pub const NONE: Self = Self(0);
    pub const PRESENT: Self = Self(1 << 0);
    pub const WRITABLE: Self = Self(1 << 1);
    pub const USER: Self = Self(1 << 2);

    // What the fault handler installs for a page restored from swap.
    pub const USER_READ_WRITE: Self = Self((1 << 0) | (1 << 1) | (1 << 2));

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl ops::BitOr for PageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for PageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PageDirectoryEntry {
    #[bit(0, rw)]
    pub present: bool,
    #[bit(1, rw)]
    pub read_write: bool,
    #[bit(2, rw)]
    pub user_supervisor: bool,
    #[bit(3, rw)]
    pub write_through: bool,
    #[bit(4, rw)]
    pub cache_disable: bool,
    #[bit(5, rw)]
    pub accessed: bool,
    #[bit(7, rw)]
    pub page_size: bool,
    #[bits(12..=31, rw)]
    pub page_table_address: u20,
}

impl PageDirectoryEntry {
    /// A present, supervisor-only entry pointing at the table stored at
    /// `table` (a physical, page aligned address).
    pub fn for_table(table: usize) -> Self {
        Self::DEFAULT
            .with_present(true)
            .with_read_write(true)
            .with_page_table_address(frame_number(table))
    }

    pub fn table(&self) -> usize {
        self.page_table_address().value() as usize * PAGE_FRAME_SIZE
    }
}

#[bitfield(u32, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct PageTableEntry {
    #[bit(0, rw)]
    pub present: bool,
    #[bit(1, rw)]
    pub read_write: bool,
    #[bit(2, rw)]
    pub user_supervisor: bool,
    #[bit(3, rw)]
    pub write_through: bool,
    #[bit(4, rw)]
    pub cache_disable: bool,
    #[bit(5, rw)]
    pub accessed: bool,
    #[bit(6, rw)]
    pub dirty: bool,
    #[bit(7, rw)]
    pub page_attribute_table: bool,
    #[bit(8, rw)]
    pub global: bool,
    #[bits(12..=31, rw)]
    pub page_frame_address: u20,
}

impl PageTableEntry {
    /// Builds a present entry for `frame`. Any offset bits in `frame` are
    /// dropped, the same way the MMU ignores them.
    pub fn mapping(frame: usize, flags: PageFlags) -> Self {
        Self::DEFAULT
            .with_present(true)
            .with_read_write(flags.contains(PageFlags::WRITABLE))
            .with_user_supervisor(flags.contains(PageFlags::USER))
            .with_page_frame_address(frame_number(frame))
    }

    /// Physical address of the mapped frame. Meaningless unless `present()`.
    pub fn frame(&self) -> usize {
        self.page_frame_address().value() as usize * PAGE_FRAME_SIZE
    }

    pub fn flags(&self) -> PageFlags {
        let mut flags = PageFlags::NONE;
        if self.present() {
            flags |= PageFlags::PRESENT;
        }
        if self.read_write() {
            flags |= PageFlags::WRITABLE;
        }
        if self.user_supervisor() {
            flags |= PageFlags::USER;
        }
        flags
    }
}

#[bitfield(u32)]
pub struct VirtualAddress {
    #[bits(22..=31, r)]
    page_directory_index: u10,
    #[bits(12..=21, r)]
    page_table_index: u10,
    #[bits(0..=11, r)]
    offset: u12,
}

impl VirtualAddress {
    /// `None` if `address` does not fit in the 32-bit address space.
    pub fn try_from_address(address: usize) -> Option<Self> {
        u32::try_from(address).ok().map(Self::new_with_raw_value)
    }

    pub fn directory_index(&self) -> usize {
        self.page_directory_index().value().into()
    }

    pub fn table_index(&self) -> usize {
        self.page_table_index().value().into()
    }

    pub fn page_offset(&self) -> usize {
        self.offset().value().into()
    }
}

fn frame_number(address: usize) -> u20 {
    u20::new(((address / PAGE_FRAME_SIZE) & 0xF_FFFF) as u32)
}
