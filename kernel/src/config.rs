use crate::error::{Result, VmError};
use mokernel_shared::{
    mem::{
        is_page_aligned, DEFAULT_TOTAL_MEMORY, IDENTITY_MAP_SIZE, PAGE_DIRECTORY_BASE,
        PAGE_FRAME_SIZE, PAGE_TABLE_POOL_BASE, PAGE_TABLE_POOL_LEN, RESERVED_LOW_MEMORY,
        SWAP_SLOTS,
    },
    paging::PAGE_DIRECTORY_LEN,
};

/// Where the paging structures live and how big the pools are.
///
/// The defaults describe the usual QEMU machine: 16MB of RAM, frames handed out
/// from 4MB up, 1MB of swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Size of physical memory in bytes. Frames are never handed out above it.
    pub total_memory: usize,
    /// First address the frame allocator may hand out.
    pub allocator_start: usize,
    pub swap_slots: usize,
    pub page_directory: usize,
    /// The statically reserved page tables. The first one becomes the identity
    /// table for directory entry 0, the rest back entries 1.. in order.
    pub page_table_pool: usize,
    pub page_table_pool_len: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_MEMORY)
    }
}

impl VmConfig {
    pub const fn new(total_memory: usize) -> Self {
        Self {
            total_memory,
            allocator_start: RESERVED_LOW_MEMORY,
            swap_slots: SWAP_SLOTS,
            page_directory: PAGE_DIRECTORY_BASE,
            page_table_pool: PAGE_TABLE_POOL_BASE,
            page_table_pool_len: PAGE_TABLE_POOL_LEN,
        }
    }

    pub const fn with_swap_slots(mut self, swap_slots: usize) -> Self {
        self.swap_slots = swap_slots;
        self
    }

    pub const fn with_page_table_pool_len(mut self, len: usize) -> Self {
        self.page_table_pool_len = len;
        self
    }

    /// Last page of the virtual space the table pool covers. Frames above the
    /// identity region are reached through it on bare metal, so it is never
    /// handed out as an ordinary mapping.
    pub const fn frame_window(&self) -> usize {
        (self.page_table_pool_len * IDENTITY_MAP_SIZE).saturating_sub(PAGE_FRAME_SIZE)
    }

    /// The pool table that holds the frame window's entry.
    pub const fn frame_window_table(&self) -> usize {
        self.page_table_pool + self.page_table_pool_len.saturating_sub(1) * PAGE_FRAME_SIZE
    }

    /// Pages below this can be mapped by the static table pool. It stops
    /// short of the frame window.
    pub const fn mappable_limit(&self) -> usize {
        self.frame_window()
    }

    pub fn validate(&self) -> Result<()> {
        if self.allocator_start < IDENTITY_MAP_SIZE {
            return Err(VmError::InvalidConfig(
                "allocator would hand out identity mapped frames",
            ));
        }
        if !is_page_aligned(self.page_directory) || !is_page_aligned(self.page_table_pool) {
            return Err(VmError::InvalidConfig("paging structures must be page aligned"));
        }
        // One table for the identity map, at least one more for the window.
        if self.page_table_pool_len < 2 || self.page_table_pool_len > PAGE_DIRECTORY_LEN {
            return Err(VmError::InvalidConfig(
                "page table pool needs between 2 and 1024 tables",
            ));
        }

        let directory = self.page_directory..self.page_directory + PAGE_FRAME_SIZE;
        let pool = self.page_table_pool
            ..self.page_table_pool + self.page_table_pool_len * PAGE_FRAME_SIZE;
        if directory.end > IDENTITY_MAP_SIZE || pool.end > IDENTITY_MAP_SIZE {
            return Err(VmError::InvalidConfig(
                "paging structures must sit in the identity mapped region",
            ));
        }
        if directory.start < pool.end && pool.start < directory.end {
            return Err(VmError::InvalidConfig(
                "page directory overlaps the page table pool",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mokernel_shared::sizes::MB;

    #[test]
    fn default_config_is_valid() {
        let config = VmConfig::default();
        assert_eq!(config.total_memory, 16 * MB);
        assert_eq!(config.allocator_start, 4 * MB);
        assert_eq!(config.swap_slots, 256);
        assert_eq!(config.mappable_limit(), 32 * MB - PAGE_FRAME_SIZE);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn frame_window_is_outside_identity_region() {
        let config = VmConfig::default();
        assert_eq!(config.frame_window(), 0x01FF_F000);
        assert!(config.frame_window() >= IDENTITY_MAP_SIZE);
        assert_eq!(config.frame_window_table(), PAGE_TABLE_POOL_BASE + 7 * PAGE_FRAME_SIZE);

        let smallest = VmConfig::default().with_page_table_pool_len(2);
        assert_eq!(smallest.validate(), Ok(()));
        assert_eq!(smallest.frame_window(), 8 * MB - PAGE_FRAME_SIZE);
    }

    #[test]
    fn rejects_allocator_inside_identity_region() {
        let config = VmConfig {
            allocator_start: 2 * MB,
            ..VmConfig::default()
        };
        assert!(matches!(config.validate(), Err(VmError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_overlapping_structures() {
        let config = VmConfig {
            page_table_pool: PAGE_DIRECTORY_BASE,
            ..VmConfig::default()
        };
        assert!(matches!(config.validate(), Err(VmError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_or_oversized_pool() {
        assert!(VmConfig::default()
            .with_page_table_pool_len(0)
            .validate()
            .is_err());
        // A single table would put the window inside the identity map.
        assert!(VmConfig::default()
            .with_page_table_pool_len(1)
            .validate()
            .is_err());
        assert!(VmConfig::default()
            .with_page_table_pool_len(1025)
            .validate()
            .is_err());
    }

    #[test]
    fn rejects_pool_past_identity_region() {
        // 300 tables starting at 3MB run well past 4MB.
        let config = VmConfig::default().with_page_table_pool_len(300);
        assert!(matches!(config.validate(), Err(VmError::InvalidConfig(_))));
    }
}
