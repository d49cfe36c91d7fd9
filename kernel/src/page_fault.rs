use crate::{
    error::{Result, VmError},
    mem::PhysicalMemory,
    mmu::Mmu,
    vmm::VirtualMemoryManager,
};
use log::info;
use mokernel_shared::{mem::page_base, paging::PageFlags};

/// A fault that was resolved by loading the page from swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultResolution {
    pub page: usize,
    pub frame: usize,
}

impl<M: PhysicalMemory, U: Mmu> VirtualMemoryManager<M, U> {
    /// Resolves a page fault at `address` by demand paging from swap.
    ///
    /// On success the page is mapped present, writable and user accessible to
    /// a fresh frame holding the swapped contents, so the faulting instruction
    /// can be retried. Every error is fatal for the faulting context, and
    /// nothing is mapped when one is returned.
    ///
    /// # Errors
    ///
    /// - [`VmError::UnresolvableFault`] if the page is not in swap, or is
    ///   already present (the fault was a protection violation).
    /// - [`VmError::MissingIntermediateTable`], [`VmError::IdentityRegion`],
    ///   [`VmError::FrameWindow`] or [`VmError::Unaddressable`] if the page
    ///   could never be mapped. Checked before a frame is taken.
    /// - [`VmError::OutOfPhysicalMemory`] if no frame is left.
    pub fn handle_page_fault(&mut self, address: usize) -> Result<FaultResolution> {
        let page = page_base(address);

        if !self.swap.exists(page) || self.entry(page).is_some() {
            return Err(VmError::UnresolvableFault { address });
        }
        self.translation.check_mappable(&self.memory, page)?;

        let frame = self.frames.allocate()?;
        self.swap.read_into(page, self.memory.frame_mut(frame)?)?;
        self.map_page(frame, page, PageFlags::USER_READ_WRITE)?;

        info!("page fault at {address:#010X}: loaded {page:#010X} from swap into {frame:#010X}");
        Ok(FaultResolution { page, frame })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::VmConfig, mem::SimulatedMemory, mmu::SoftMmu};
    use mokernel_shared::{mem::PAGE_FRAME_SIZE, sizes::MB};

    fn manager(config: VmConfig) -> VirtualMemoryManager<SimulatedMemory, SoftMmu> {
        VirtualMemoryManager::simulated(config).unwrap()
    }

    #[test]
    fn test_fault_loads_page_from_swap() {
        let mut vm = manager(VmConfig::default());
        vm.swap_mut().seed(0x0050_0000, b"HELLO").unwrap();

        let resolution = vm.handle_page_fault(0x0050_0004).unwrap();
        assert_eq!(
            resolution,
            FaultResolution {
                page: 0x0050_0000,
                frame: 4 * MB
            }
        );

        let entry = vm.entry(0x0050_0000).unwrap();
        assert_eq!(entry.frame(), 4 * MB);
        assert_eq!(entry.flags(), PageFlags::USER_READ_WRITE);
        assert_eq!(&vm.memory().frame(4 * MB).unwrap()[..5], b"HELLO");
        assert_eq!(vm.mmu().invalidations(), &[0x0050_0000]);
    }

    #[test]
    fn test_fault_outside_swap_is_unresolvable() {
        let mut vm = manager(VmConfig::default());
        assert_eq!(
            vm.handle_page_fault(0x0060_0000),
            Err(VmError::UnresolvableFault {
                address: 0x0060_0000
            })
        );
        assert_eq!(vm.frames().allocated(), 0);
        assert_eq!(vm.entry(0x0060_0000), None);
    }

    #[test]
    fn test_fault_on_present_page_is_unresolvable() {
        let mut vm = manager(VmConfig::default());
        vm.swap_mut().seed(0x0050_0000, b"HELLO").unwrap();
        vm.handle_page_fault(0x0050_0000).unwrap();

        assert_eq!(
            vm.handle_page_fault(0x0050_0000),
            Err(VmError::UnresolvableFault {
                address: 0x0050_0000
            })
        );
        assert_eq!(vm.frames().allocated(), 1);
    }

    #[test]
    fn test_fault_without_table_keeps_frames() {
        let mut vm = manager(VmConfig::default());
        vm.swap_mut().seed(0x4000_0000, b"far").unwrap();
        assert_eq!(
            vm.handle_page_fault(0x4000_0000),
            Err(VmError::MissingIntermediateTable {
                address: 0x4000_0000
            })
        );
        assert_eq!(vm.frames().allocated(), 0);
    }

    #[test]
    fn test_fault_out_of_memory_maps_nothing() {
        let total = 4 * MB + PAGE_FRAME_SIZE;
        let mut vm = manager(VmConfig::new(total));
        vm.swap_mut().seed(0x0050_0000, b"one").unwrap();
        vm.swap_mut().seed(0x0050_1000, b"two").unwrap();

        vm.handle_page_fault(0x0050_0000).unwrap();
        assert_eq!(
            vm.handle_page_fault(0x0050_1000),
            Err(VmError::OutOfPhysicalMemory)
        );
        assert_eq!(vm.entry(0x0050_1000), None);
    }

    #[test]
    fn test_fault_on_frame_window_keeps_frames() {
        let mut vm = manager(VmConfig::default());
        let window = vm.config().frame_window();
        vm.swap_mut().seed(window, b"window").unwrap();
        assert_eq!(
            vm.handle_page_fault(window + 8),
            Err(VmError::FrameWindow {
                address: window
            })
        );
        assert_eq!(vm.frames().allocated(), 0);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_fault_beyond_32_bits_does_not_alias() {
        let mut vm = manager(VmConfig::default());
        vm.swap_mut().seed(0x1_0060_0000, b"high").unwrap();
        assert_eq!(
            vm.handle_page_fault(0x1_0060_0000),
            Err(VmError::Unaddressable {
                address: 0x1_0060_0000
            })
        );
        assert_eq!(vm.frames().allocated(), 0);
        assert_eq!(vm.translate(0x0060_0000), None);
    }
}
