//! Two-level x86 translation: one page directory, page tables from a static
//! pool. Everything is stored in physical memory and walked by address.

use crate::{
    config::VmConfig,
    error::{Result, VmError},
    mem::PhysicalMemory,
    mmu::Mmu,
};
use core::mem::size_of;
use log::{debug, trace};
use mokernel_shared::{
    mem::{page_base, IDENTITY_MAP_SIZE, PAGE_FRAME_SIZE},
    paging::{PageDirectoryEntry, PageFlags, PageTableEntry, VirtualAddress, PAGE_TABLE_LEN},
};

const ENTRY_SIZE: usize = size_of::<u32>();

/// Handle on the active page directory. All state lives in physical memory,
/// so every operation takes the memory it should walk.
#[derive(Debug)]
pub struct TranslationTable {
    directory: usize,
    window: usize,
}

impl TranslationTable {
    /// Builds the directory and static table pool described by `config` and
    /// activates it.
    ///
    /// Directory entry 0 gets the first pool table, which identity maps the
    /// first 4MB as supervisor read/write. The remaining pool tables are
    /// installed empty behind entries 1.., so pages up to
    /// [`VmConfig::mappable_limit`] can be mapped later without ever drawing
    /// a table from the frame allocator. The last page of the last table is
    /// the frame window and stays reserved.
    ///
    /// # Errors
    ///
    /// [`VmError::NoSuchFrame`] if the directory or a pool table lies outside
    /// `memory`.
    pub fn init<M: PhysicalMemory, U: Mmu>(
        memory: &mut M,
        mmu: &mut U,
        config: &VmConfig,
    ) -> Result<Self> {
        let directory = config.page_directory;

        // An all zero directory has no entry present.
        memory.zero_frame(directory)?;

        for index in 0..config.page_table_pool_len {
            let table = config.page_table_pool + index * PAGE_FRAME_SIZE;
            memory.zero_frame(table)?;
            memory.write_u32(
                directory + index * ENTRY_SIZE,
                PageDirectoryEntry::for_table(table).raw_value(),
            );
        }

        let bootstrap = config.page_table_pool;
        for index in 0..PAGE_TABLE_LEN {
            let frame = index * PAGE_FRAME_SIZE;
            memory.write_u32(
                bootstrap + index * ENTRY_SIZE,
                PageTableEntry::mapping(frame, PageFlags::WRITABLE).raw_value(),
            );
        }

        mmu.activate(directory);
        debug!(
            "page directory at {directory:#010X}, {} static tables, identity mapped 0..{IDENTITY_MAP_SIZE:#X}",
            config.page_table_pool_len
        );

        Ok(Self {
            directory,
            window: config.frame_window(),
        })
    }

    pub fn directory(&self) -> usize {
        self.directory
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// `None` for addresses beyond the 32-bit address space, which no
    /// directory slot covers.
    pub fn directory_entry<M: PhysicalMemory>(
        &self,
        memory: &M,
        address: usize,
    ) -> Option<PageDirectoryEntry> {
        let index = VirtualAddress::try_from_address(address)?.directory_index();
        Some(PageDirectoryEntry::new_with_raw_value(
            memory.read_u32(self.directory + index * ENTRY_SIZE),
        ))
    }

    /// Physical address of the table entry for `address`, if its page table
    /// exists.
    fn slot<M: PhysicalMemory>(&self, memory: &M, address: usize) -> Option<usize> {
        let virtual_address = VirtualAddress::try_from_address(address)?;
        let directory_entry = self.directory_entry(memory, address)?;
        if !directory_entry.present() {
            return None;
        }
        Some(directory_entry.table() + virtual_address.table_index() * ENTRY_SIZE)
    }

    /// The table entry mapping `address`, if the page is present.
    pub fn entry<M: PhysicalMemory>(&self, memory: &M, address: usize) -> Option<PageTableEntry> {
        let slot = self.slot(memory, address)?;
        let entry = PageTableEntry::new_with_raw_value(memory.read_u32(slot));
        entry.present().then_some(entry)
    }

    /// Walks the tables like the MMU would and returns the physical address
    /// `address` resolves to.
    pub fn translate<M: PhysicalMemory>(&self, memory: &M, address: usize) -> Option<usize> {
        let offset = VirtualAddress::try_from_address(address)?.page_offset();
        let entry = self.entry(memory, address)?;
        Some(entry.frame() + offset)
    }

    /// Checks that `map` would succeed for `address` without changing
    /// anything.
    ///
    /// # Errors
    ///
    /// [`VmError::Unaddressable`] beyond 32 bits, [`VmError::IdentityRegion`]
    /// below 4MB, [`VmError::FrameWindow`] for the window page and
    /// [`VmError::MissingIntermediateTable`] when no table backs the
    /// directory slot.
    pub fn check_mappable<M: PhysicalMemory>(&self, memory: &M, address: usize) -> Result<()> {
        self.slot_for_update(memory, address).map(|_| ())
    }

    fn slot_for_update<M: PhysicalMemory>(&self, memory: &M, address: usize) -> Result<usize> {
        if u32::try_from(address).is_err() {
            return Err(VmError::Unaddressable { address });
        }
        if page_base(address) < IDENTITY_MAP_SIZE {
            return Err(VmError::IdentityRegion { address });
        }
        if page_base(address) == self.window {
            return Err(VmError::FrameWindow { address });
        }
        self.slot(memory, address)
            .ok_or(VmError::MissingIntermediateTable { address })
    }

    /// Maps the page containing `address` to `frame` with `flags | PRESENT`
    /// and invalidates the cached translation for that page only.
    ///
    /// An existing mapping for the page is replaced.
    ///
    /// # Errors
    ///
    /// See [`TranslationTable::check_mappable`], plus
    /// [`VmError::Unaddressable`] for a frame beyond 32 bits. Nothing is
    /// written on error.
    pub fn map<M: PhysicalMemory, U: Mmu>(
        &self,
        memory: &mut M,
        mmu: &mut U,
        frame: usize,
        address: usize,
        flags: PageFlags,
    ) -> Result<()> {
        let slot = self.slot_for_update(memory, address)?;
        if u32::try_from(frame).is_err() {
            return Err(VmError::Unaddressable { address: frame });
        }
        let entry = PageTableEntry::mapping(frame, flags);
        memory.write_u32(slot, entry.raw_value());
        mmu.invalidate(page_base(address));
        trace!(
            "mapped {:#010X} -> {:#010X} ({:#05b})",
            page_base(address),
            entry.frame(),
            entry.flags().bits()
        );
        Ok(())
    }

    /// Clears the mapping for the page containing `address`. Returns whether
    /// anything was mapped.
    ///
    /// # Errors
    ///
    /// As for [`TranslationTable::check_mappable`], except that an address
    /// without a page table is simply not mapped, so that is `Ok(false)`.
    pub fn unmap<M: PhysicalMemory, U: Mmu>(
        &self,
        memory: &mut M,
        mmu: &mut U,
        address: usize,
    ) -> Result<bool> {
        let slot = match self.slot_for_update(memory, address) {
            Ok(slot) => slot,
            Err(VmError::MissingIntermediateTable { .. }) => return Ok(false),
            Err(err) => return Err(err),
        };

        let entry = PageTableEntry::new_with_raw_value(memory.read_u32(slot));
        if !entry.present() {
            return Ok(false);
        }

        memory.write_u32(slot, PageTableEntry::DEFAULT.raw_value());
        mmu.invalidate(page_base(address));
        trace!("unmapped {:#010X}", page_base(address));
        Ok(true)
    }
}
