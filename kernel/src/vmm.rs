use crate::{
    config::VmConfig,
    error::Result,
    mem::{frame_allocator::FrameAllocator, PhysicalMemory, SimulatedMemory},
    mmu::{Mmu, SoftMmu},
    paging::TranslationTable,
    swapping::SwapStore,
};
use log::{debug, info};
use mokernel_shared::{
    mem::{page_base, IDENTITY_MAP_SIZE},
    paging::{PageFlags, PageTableEntry},
};

/// Owns everything the virtual memory core needs: the translation table, the
/// frame allocator, the swap store, and the memory and MMU they act on.
pub struct VirtualMemoryManager<M: PhysicalMemory, U: Mmu> {
    pub(crate) translation: TranslationTable,
    pub(crate) frames: FrameAllocator,
    pub(crate) swap: SwapStore,
    pub(crate) memory: M,
    pub(crate) mmu: U,
    config: VmConfig,
}

impl<M: PhysicalMemory, U: Mmu> VirtualMemoryManager<M, U> {
    /// Validates `config`, then builds and activates the translation table,
    /// then sets up the frame allocator and the swap store, in that order.
    pub fn init(mut memory: M, mut mmu: U, config: VmConfig) -> Result<Self> {
        config.validate()?;

        let translation = TranslationTable::init(&mut memory, &mut mmu, &config)?;
        let frames = FrameAllocator::new(config.total_memory, config.allocator_start);
        let swap = SwapStore::new(config.swap_slots);

        info!(
            "virtual memory up: {} frames free, {} swap slots, pages mappable below {:#010X}, frame window at {:#010X}",
            frames.remaining(),
            swap.capacity(),
            config.mappable_limit(),
            translation.window()
        );

        Ok(Self {
            translation,
            frames,
            swap,
            memory,
            mmu,
            config,
        })
    }

    /// Maps the page containing `address` to `frame`.
    pub fn map_page(&mut self, frame: usize, address: usize, flags: PageFlags) -> Result<()> {
        self.translation
            .map(&mut self.memory, &mut self.mmu, frame, address, flags)
    }

    /// Returns whether a mapping was removed.
    pub fn unmap_page(&mut self, address: usize) -> Result<bool> {
        self.translation
            .unmap(&mut self.memory, &mut self.mmu, address)
    }

    /// Backs the page containing `address` with a fresh zeroed frame and
    /// returns the frame.
    pub fn allocate_page(&mut self, address: usize, flags: PageFlags) -> Result<usize> {
        self.translation.check_mappable(&self.memory, address)?;
        let frame = self.frames.allocate()?;
        self.memory.zero_frame(frame)?;
        self.map_page(frame, address, flags)?;
        Ok(frame)
    }

    /// Copies a resident page into the swap store and unmaps it. Returns the
    /// frame that backed it, or `None` if the page was not resident.
    ///
    /// A later access faults and restores the page from swap. On error the
    /// page stays mapped and swap is unchanged.
    pub fn swap_out(&mut self, address: usize) -> Result<Option<usize>> {
        let Some(entry) = self.entry(address) else {
            return Ok(None);
        };
        let page = page_base(address);
        self.translation.check_mappable(&self.memory, page)?;

        let frame = entry.frame();
        self.swap.write(page, self.memory.frame_mut(frame)?)?;
        self.unmap_page(page)?;
        self.frames.release(frame);
        debug!("swapped out {page:#010X} from frame {frame:#010X}");
        Ok(Some(frame))
    }

    pub fn translate(&self, address: usize) -> Option<usize> {
        self.translation.translate(&self.memory, address)
    }

    pub fn entry(&self, address: usize) -> Option<PageTableEntry> {
        self.translation.entry(&self.memory, address)
    }

    pub fn frames(&self) -> &FrameAllocator {
        &self.frames
    }

    pub fn swap(&self) -> &SwapStore {
        &self.swap
    }

    pub fn swap_mut(&mut self) -> &mut SwapStore {
        &mut self.swap
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn mmu(&self) -> &U {
        &self.mmu
    }

    pub fn mmu_mut(&mut self) -> &mut U {
        &mut self.mmu
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }
}

impl VirtualMemoryManager<SimulatedMemory, SoftMmu> {
    /// A manager over zeroed simulated RAM. The RAM always covers the identity
    /// region so the paging structures have somewhere to live.
    pub fn simulated(config: VmConfig) -> Result<Self> {
        let memory = SimulatedMemory::new(config.total_memory.max(IDENTITY_MAP_SIZE));
        Self::init(memory, SoftMmu::new(), config)
    }

    /// Reads `buffer.len()` bytes through the current translation, the way a
    /// program would. Returns the first address that is not mapped.
    pub fn read_virtual(&self, address: usize, buffer: &mut [u8]) -> core::result::Result<(), usize> {
        for (i, byte) in buffer.iter_mut().enumerate() {
            let physical = self.translate(address + i).ok_or(address + i)?;
            let mut single = [0];
            self.memory.read(physical, &mut single);
            *byte = single[0];
        }
        Ok(())
    }
}
